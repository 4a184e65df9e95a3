//! The meeting processor (spec §4.6): turns one [`ExtractionResult`] into
//! persisted entities, state history, transitions, relationships, and
//! memories. Nine stages run in a fixed order — each one is its own module
//! so the pipeline reads the way `processor_v2.py`'s `process_meeting` does,
//! top to bottom:
//!
//! 1. [`entities::process_entities`] — normalize and upsert entities.
//! 2. [`states::fetch_prior_states`] — load each entity's current state.
//! 3. [`states::assemble_current_states`] — this meeting's state claims.
//! 4-6. [`states::diff_and_emit_transitions`] — batch diff, refine reasons.
//! 7. [`relationships::process_relationships`] — resolve and persist edges.
//! 8. [`memories::process_memories`] — resolve mentions, persist memories.
//! 9. [`validation::validate`] — completeness/consistency metrics.
//!
//! The `Meeting` record itself is built and persisted last, once
//! `memory_count`/`entity_count` are known (invariant I3).

pub mod entities;
pub mod error;
pub mod memories;
pub mod reason;
pub mod relationships;
pub mod states;
pub mod validation;

use chrono::{DateTime, NaiveDate, Utc};
use meetgraph_core::{Entity, EntityRelationship, EntityState, ExtractionResult, Meeting, Memory, StateTransition};
use meetgraph_embeddings::EmbeddingEngine;
use meetgraph_llm::LlmProcessor;
use meetgraph_resolver::EntityResolver;
use meetgraph_storage::Store;
use tracing::instrument;
use uuid::Uuid;

pub use error::{ProcessorError, ProcessorResult};
pub use validation::ValidationMetrics;

/// Everything one `process_meeting` call produced, for a caller to log,
/// return to a client, or discard.
#[derive(Debug, Clone)]
pub struct ProcessingSummary {
    pub meeting: Meeting,
    pub entities: Vec<Entity>,
    pub new_states: Vec<EntityState>,
    pub transitions: Vec<StateTransition>,
    pub relationships: Vec<EntityRelationship>,
    pub memories: Vec<Memory>,
    pub metrics: ValidationMetrics,
}

/// Runs the full nine-stage pipeline against one already-extracted meeting
/// and persists every result. `memory_vectors` must be the same length and
/// order as `extraction.memories` — embedding them is the caller's job
/// (spec §4.1: the embedding engine sits upstream of the processor).
/// `embeddings` is used internally, in stage 1, to generate and persist each
/// upserted entity's name vector so the resolver's vector-similarity
/// strategy (spec §4.3) has a populated catalog to search.
#[instrument(skip(store, resolver, llm_processor, embeddings, transcript, extraction, memory_vectors), fields(meeting_id = %meeting_id))]
pub async fn process_meeting(
    store: &Store,
    resolver: &EntityResolver,
    llm_processor: &LlmProcessor,
    embeddings: &EmbeddingEngine,
    meeting_id: Uuid,
    transcript: &str,
    extraction: ExtractionResult,
    memory_vectors: &[Vec<f32>],
) -> ProcessorResult<ProcessingSummary> {
    let entity_map = entities::process_entities(store, embeddings, &extraction.entities)?;
    let entity_ids: Vec<Uuid> = entity_map.values().map(|e| e.id).collect();

    let prior_states = states::fetch_prior_states(store, &entity_ids)?;
    let current_states = states::assemble_current_states(&extraction.entities, &entity_map);
    let diff = states::diff_and_emit_transitions(llm_processor, &prior_states, &current_states, meeting_id, &extraction.summary).await?;

    if !diff.new_states.is_empty() {
        store.save_entity_states(&diff.new_states)?;
    }
    if !diff.transitions.is_empty() {
        store.save_transitions(&diff.transitions)?;
    }

    let relationships =
        relationships::process_relationships(store, resolver, &entity_map, &extraction.relationships, meeting_id).await?;
    let memories =
        memories::process_memories(store, resolver, &entity_map, &extraction.memories, memory_vectors, meeting_id).await?;

    let metrics = validation::validate(&entity_map, &prior_states, &diff.new_states, &diff.transitions);

    let now = Utc::now();
    let meeting = Meeting {
        id: meeting_id,
        title: extraction.meeting_title.clone(),
        transcript: transcript.to_string(),
        participants: extraction.participants.clone(),
        date: parse_meeting_date(extraction.meeting_date.as_deref()).unwrap_or(now),
        summary: (!extraction.summary.is_empty()).then(|| extraction.summary.clone()),
        topics: extraction.topics.clone(),
        key_decisions: extraction.key_decisions.clone(),
        action_items: extraction.action_items.clone(),
        created_at: now,
        memory_count: memories.len(),
        entity_count: entity_map.len(),
    };
    store.save_meeting(&meeting)?;

    Ok(ProcessingSummary {
        meeting,
        entities: entity_map.into_values().collect(),
        new_states: diff.new_states,
        transitions: diff.transitions,
        relationships,
        memories,
        metrics,
    })
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates — the two shapes
/// extraction actually produces (a model-reported ISO timestamp, or a date
/// pulled from email headers).
fn parse_meeting_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc));
    }
    None
}
