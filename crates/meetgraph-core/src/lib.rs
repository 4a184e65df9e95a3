//! Shared types, canonical vocabularies, and error taxonomy for the
//! meetgraph workspace.

pub mod error;
pub mod model;
pub mod vocab;

pub use error::{CoreError, CoreResult};
pub use model::{
    ActionItem, Entity, EntityMatch, EntityRelationship, EntityState, ExtractedEntity,
    ExtractedMemory, ExtractedRelationship, ExtractionResult, IntentKind, MatchKind, Meeting,
    Memory, QueryAnswer, QueryIntent, SearchResult, StateTransition, TimeRange,
};
pub use vocab::{
    display_status, is_recognized_relationship_alias, normalize_name, normalize_relationship_type,
    normalize_status_str, EntityType, RelationshipType, Status,
};
