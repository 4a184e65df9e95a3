//! Stages 2-6 (spec §4.6): prior-state fetch, current-state assembly, batch
//! state diffing, and transition emission. Regex-based state inference is
//! deliberately absent — the extractor's `current_state` is the only
//! source of truth (spec §4.6 stage 3, §9 "Design Notes").

use std::collections::HashMap;

use chrono::Utc;
use meetgraph_core::{normalize_status_str, Entity, EntityState, ExtractedEntity, StateTransition};
use meetgraph_llm::LlmProcessor;
use meetgraph_storage::Store;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::ProcessorResult;
use crate::reason;

/// Stage 2: the most recent `EntityState` for every entity, keyed by id.
/// `None` means the entity has no recorded state yet.
pub fn fetch_prior_states(store: &Store, entity_ids: &[Uuid]) -> ProcessorResult<HashMap<Uuid, Option<EntityState>>> {
    let mut out = HashMap::with_capacity(entity_ids.len());
    for &id in entity_ids {
        out.insert(id, store.get_entity_current_state(id)?);
    }
    Ok(out)
}

/// Stage 3: the extractor is the single source of state (spec §9) — no
/// transcript regex inference is layered on top, ever. `status` values are
/// normalized unconditionally on write (§4 open-question decision).
pub fn assemble_current_states(entities: &[ExtractedEntity], entity_map: &HashMap<String, Entity>) -> HashMap<Uuid, HashMap<String, Value>> {
    let mut out = HashMap::new();
    for raw in entities {
        let name = raw.name.trim();
        let Some(entity) = entity_map.get(name) else { continue };
        if is_empty_state(&raw.current_state) {
            continue;
        }
        out.insert(entity.id, normalize_state(&raw.current_state));
    }
    out
}

fn normalize_state(state: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = state.clone();
    if let Some(Value::String(status)) = out.get("status").cloned() {
        out.insert("status".to_string(), Value::String(normalize_status_str(&status)));
    }
    out
}

/// A state dict with only null/empty values carries no real information
/// (ported from `processor_v2.py`'s `_is_empty_state`).
fn is_empty_state(state: &HashMap<String, Value>) -> bool {
    state.values().all(|v| matches!(v, Value::Null) || v == &Value::String(String::new()) || v == &Value::Array(vec![]))
}

/// The outcome of stages 4-6: every transition to persist, paired with the
/// new `EntityState` snapshot it was derived from.
pub struct DiffOutcome {
    pub transitions: Vec<StateTransition>,
    pub new_states: Vec<EntityState>,
}

/// Stages 4-6: diff every `(prior, current)` pair via the batched LLM
/// comparator (or synthesize an initial transition when there is no prior
/// state), then refine any transition the comparator left without a
/// reason.
pub async fn diff_and_emit_transitions(
    llm_processor: &LlmProcessor,
    prior_states: &HashMap<Uuid, Option<EntityState>>,
    current_states: &HashMap<Uuid, HashMap<String, Value>>,
    meeting_id: Uuid,
    meeting_summary: &str,
) -> ProcessorResult<DiffOutcome> {
    let mut transitions = Vec::new();
    let mut new_states = Vec::new();

    let mut pairs = Vec::new();
    let mut pair_entity_ids = Vec::new();

    for (&entity_id, current) in current_states {
        match prior_states.get(&entity_id).and_then(|p| p.as_ref()) {
            None => {
                let mut changed_fields: Vec<String> = current.keys().cloned().collect();
                changed_fields.sort();
                info!(entity_id = %entity_id, "creating initial state transition");
                transitions.push(StateTransition {
                    id: Uuid::new_v4(),
                    entity_id,
                    from_state: None,
                    to_state: current.clone(),
                    changed_fields,
                    reason: "Initial state captured".to_string(),
                    meeting_id,
                    timestamp: Utc::now(),
                });
                new_states.push(EntityState {
                    id: Uuid::new_v4(),
                    entity_id,
                    state: current.clone(),
                    meeting_id,
                    timestamp: Utc::now(),
                    confidence: 0.9,
                });
            }
            Some(prior) => {
                pairs.push((prior.state.clone(), current.clone()));
                pair_entity_ids.push(entity_id);
            }
        }
    }

    if !pairs.is_empty() {
        let comparisons = llm_processor.compare_states_batch(&pairs).await.map_err(meetgraph_core::CoreError::from)?;
        for (idx, comparison) in comparisons.into_iter().enumerate() {
            if !comparison.has_changes {
                continue;
            }
            let entity_id = pair_entity_ids[idx];
            let (prior, current) = &pairs[idx];

            let reason = if comparison.reason.trim().is_empty() {
                reason::refine_reason(llm_processor, Some(prior), current, meeting_summary).await
            } else {
                comparison.reason
            };

            info!(entity_id = %entity_id, changed_fields = ?comparison.changed_fields, "state transition detected");
            transitions.push(StateTransition {
                id: Uuid::new_v4(),
                entity_id,
                from_state: Some(prior.clone()),
                to_state: current.clone(),
                changed_fields: comparison.changed_fields,
                reason,
                meeting_id,
                timestamp: Utc::now(),
            });
            new_states.push(EntityState {
                id: Uuid::new_v4(),
                entity_id,
                state: current.clone(),
                meeting_id,
                timestamp: Utc::now(),
                confidence: 0.9,
            });
        }
    }

    Ok(DiffOutcome { transitions, new_states })
}
