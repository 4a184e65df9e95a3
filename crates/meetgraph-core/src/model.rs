//! Shared domain types (spec §3), ported from the original `models.py`
//! dataclasses. Every crate in the workspace that touches entities,
//! relationships, states, transitions, memories, or meetings depends on
//! these definitions rather than redefining its own.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::vocab::{EntityType, RelationshipType};

/// A resolved business entity (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
    pub normalized_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Entity {
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized_name = crate::vocab::normalize_name(&name);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            entity_type,
            name,
            normalized_name,
            attributes: HashMap::new(),
            first_seen: now,
            last_updated: now,
        }
    }
}

/// How a query term was matched to an entity (spec §4.3). The four
/// `Llm*`/`NoEntities` variants beyond the core `exact|vector|fuzzy|llm` set
/// let a caller tell a disabled LLM strategy apart from one that tried and
/// failed (spec §9 supplement, ported from `entity_resolver.py`'s distinct
/// `match_type` strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Vector,
    Fuzzy,
    Llm,
    LlmNoMatch,
    LlmDisabled,
    LlmError,
    NoEntities,
}

/// The result of resolving one query term against the entity catalog.
/// `entity` is `None` when nothing cleared any strategy's threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub query_term: String,
    pub entity: Option<Entity>,
    pub confidence: f32,
    pub match_type: MatchKind,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// A point-in-time snapshot of an entity's attributes as observed in one
/// meeting (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub state: HashMap<String, Value>,
    pub meeting_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
}

/// A directed edge between two entities (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub id: Uuid,
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    pub meeting_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub active: bool,
}

/// A recorded change from one state snapshot to the next (spec §3, invariant
/// I1: every transition's `to_state` must equal the entity's current state
/// as of `timestamp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub from_state: Option<HashMap<String, Value>>,
    pub to_state: HashMap<String, Value>,
    pub changed_fields: Vec<String>,
    pub reason: String,
    pub meeting_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// One atomic statement extracted from a transcript (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub content: String,
    pub speaker: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Entity ids mentioned in `content`, resolved during processing
    /// (invariant I4: every id here must reference an entity that exists).
    #[serde(default)]
    pub entity_mentions: Vec<Uuid>,
    pub embedding_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A processed meeting and its rollup metadata (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub title: String,
    pub transcript: String,
    #[serde(default)]
    pub participants: Vec<String>,
    pub date: DateTime<Utc>,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    pub created_at: DateTime<Utc>,
    /// Invariant I3: must equal `memories.len()` for this meeting.
    pub memory_count: usize,
    pub entity_count: usize,
}

/// An action item captured by extraction (spec §3.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub description: String,
    pub owner: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// One hit from a memory/entity search (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub memory: Memory,
    pub meeting: Meeting,
    pub score: f32,
    pub distance: f32,
    #[serde(default)]
    pub relevant_entities: Vec<Entity>,
}

/// The raw output of extraction, prior to entity resolution and state
/// diffing (spec §3.7, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub memories: Vec<ExtractedMemory>,
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
    pub meeting_title: String,
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    /// Free-form extraction metadata (spec §4.5/§7): `extraction_method`,
    /// `extraction_error`, and passthrough fields from the original source
    /// (`meeting_type`, `detailed_summary`, `transcript_context`, `risks`,
    /// `follow_up_required`) that don't warrant their own typed field.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// One memory as produced directly by extraction, before an id or embedding
/// has been assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMemory {
    pub content: String,
    pub speaker: Option<String>,
    #[serde(default)]
    pub entity_mentions: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// One entity as produced directly by extraction: a name, a type, and the
/// current-state attributes observed for it in this meeting. No id yet —
/// resolution assigns that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub current_state: HashMap<String, Value>,
}

/// A relationship as produced directly by extraction, referencing entities
/// by name rather than id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

/// The classified intent of a natural-language query (spec §5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Timeline,
    Blocker,
    Status,
    Ownership,
    Analytics,
    Relationship,
    Search,
}

/// A time window extracted from a query's free text (spec §5.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The classified intent plus whatever the query parser could pull out of
/// the query text (spec §5.1-§5.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub intent_type: IntentKind,
    pub confidence: f32,
    #[serde(default)]
    pub entities: Vec<String>,
    pub time_range: Option<TimeRange>,
}

/// The final answer returned to a caller of the query engine (spec §5.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub query: String,
    pub intent: QueryIntent,
    pub answer: String,
    pub supporting_data: Value,
    pub entities_involved: Vec<Uuid>,
    pub confidence: f32,
    #[serde(default)]
    pub follow_up_suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_new_normalizes_name() {
        let e = Entity::new(EntityType::Project, "  API   Migration ");
        assert_eq!(e.normalized_name, "api migration");
        assert_eq!(e.name, "  API   Migration ");
    }

    #[test]
    fn entity_round_trips_through_json() {
        let e = Entity::new(EntityType::Person, "Dana Scully");
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, e.id);
        assert_eq!(back.entity_type, e.entity_type);
    }
}
