//! Persistent relational store and vector store for the meetgraph pipeline
//! (spec §4.2). [`Store`] is the single entry point the rest of the
//! workspace depends on; it composes [`relational::RelationalStore`] (the
//! redb-backed tables in §3) with [`vector::VectorStore`] (the two named
//! embedding collections in §6).

pub mod error;
pub mod relational;
pub mod vector;

use std::collections::HashMap;
use std::path::Path;

use meetgraph_core::{Entity, EntityRelationship, EntityState, EntityType, Meeting, Memory, SearchResult, StateTransition};
use uuid::Uuid;

pub use error::{StorageError, StorageResult};
pub use relational::{RelationalStore, RelationshipView, TimelineEntry};
pub use vector::{MemoryHit, MemorySearchFilters, MemoryVectorPayload, VectorStore};

/// The composed store. Relational and vector writes are issued against two
/// independent redb files — spec §4.2 calls cross-store operations
/// "best-effort"; a caller whose relational write succeeds and whose vector
/// write fails must retry, which is safe because every id is a stable UUID.
pub struct Store {
    relational: RelationalStore,
    vectors: VectorStore,
}

impl Store {
    pub fn open(relational_path: impl AsRef<Path>, vector_path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            relational: RelationalStore::open(relational_path)?,
            vectors: VectorStore::open(vector_path)?,
        })
    }

    /// Open using the workspace config's relational path, deriving the
    /// vector store's path alongside it.
    pub fn open_from_config(config: &meetgraph_config::StorageConfig) -> StorageResult<Self> {
        let relational_path = Path::new(&config.relational_store_path);
        let vector_path = relational_path.with_extension("vectors.redb");
        Self::open(relational_path, vector_path)
    }

    pub fn relational(&self) -> &RelationalStore {
        &self.relational
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    // ── Meetings ────────────────────────────────────────────────────────

    pub fn save_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        self.relational.save_meeting(meeting)
    }

    pub fn get_meeting(&self, id: Uuid) -> StorageResult<Option<Meeting>> {
        self.relational.get_meeting(id)
    }

    // ── Memories (relational + vector, best-effort atomic) ──────────────

    pub fn save_memories(&self, memories: &[Memory], vectors: &[Vec<f32>]) -> StorageResult<()> {
        self.relational.save_memories(memories)?;

        let batch = memories
            .iter()
            .zip(vectors.iter())
            .map(|(memory, vector)| {
                let payload = MemoryVectorPayload {
                    meeting_id: memory.meeting_id,
                    content: memory.content.clone(),
                    speaker: memory.speaker.clone(),
                    timestamp: memory.timestamp,
                    metadata: memory.metadata.clone(),
                    entity_mentions: memory.entity_mentions.clone(),
                };
                (memory.id, vector.clone(), payload)
            })
            .collect();
        self.vectors.save_memory_vectors(batch)
    }

    pub fn get_memory(&self, id: Uuid) -> StorageResult<Option<Memory>> {
        self.relational.get_memory(id)
    }

    /// Semantic memory search (spec §4.2): joins raw vector hits back to
    /// their `Memory`, originating `Meeting`, and mentioned `Entity`
    /// records.
    pub fn search_memories(&self, query: &[f32], filters: &MemorySearchFilters, k: usize) -> StorageResult<Vec<SearchResult>> {
        let hits = self.vectors.search_memories(query, filters, k)?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(memory) = self.relational.get_memory(hit.memory_id)? else {
                continue;
            };
            let Some(meeting) = self.relational.get_meeting(hit.payload.meeting_id)? else {
                continue;
            };
            let relevant_entities = self.relational.get_entities_batch(&memory.entity_mentions)?;

            out.push(SearchResult {
                memory,
                meeting,
                score: hit.score,
                distance: 1.0 - hit.score,
                relevant_entities,
            });
        }
        Ok(out)
    }

    // ── Entities ────────────────────────────────────────────────────────

    pub fn save_entities(&self, entities: &[Entity]) -> StorageResult<Vec<Entity>> {
        self.relational.save_entities(entities)
    }

    pub fn get_entity(&self, id: Uuid) -> StorageResult<Option<Entity>> {
        self.relational.get_entity(id)
    }

    pub fn get_entities_batch(&self, ids: &[Uuid]) -> StorageResult<Vec<Entity>> {
        self.relational.get_entities_batch(ids)
    }

    pub fn get_entity_by_name(&self, name: &str, entity_type: Option<EntityType>) -> StorageResult<Option<Entity>> {
        self.relational.get_entity_by_name(name, entity_type)
    }

    pub fn get_all_entities(&self, entity_type: Option<EntityType>, limit: Option<usize>, offset: usize) -> StorageResult<Vec<Entity>> {
        self.relational.get_all_entities(entity_type, limit, offset)
    }

    // ── State & transitions ──────────────────────────────────────────────

    pub fn save_entity_states(&self, states: &[EntityState]) -> StorageResult<()> {
        self.relational.save_entity_states(states)
    }

    pub fn save_transitions(&self, transitions: &[StateTransition]) -> StorageResult<()> {
        self.relational.save_transitions(transitions)
    }

    pub fn get_entity_current_state(&self, entity_id: Uuid) -> StorageResult<Option<EntityState>> {
        self.relational.get_entity_current_state(entity_id)
    }

    pub fn get_entity_states(&self, entity_id: Uuid) -> StorageResult<Vec<EntityState>> {
        self.relational.get_entity_states(entity_id)
    }

    pub fn get_entity_timeline(&self, entity_id: Uuid) -> StorageResult<Vec<TimelineEntry>> {
        self.relational.get_entity_timeline(entity_id)
    }

    // ── Relationships ────────────────────────────────────────────────────

    pub fn save_relationships(&self, relationships: &[EntityRelationship]) -> StorageResult<Vec<EntityRelationship>> {
        self.relational.save_relationships(relationships)
    }

    pub fn get_entity_relationships(&self, entity_id: Uuid, active_only: bool) -> StorageResult<Vec<RelationshipView>> {
        self.relational.get_entity_relationships(entity_id, active_only)
    }

    // ── Entity-name embeddings ────────────────────────────────────────────

    pub fn save_entity_embedding(&self, entity_id: Uuid, vector: Vec<f32>) -> StorageResult<()> {
        self.vectors.save_entity_embedding(entity_id, vector)
    }

    pub fn get_entity_embedding(&self, entity_id: Uuid) -> StorageResult<Option<Vec<f32>>> {
        self.vectors.get_entity_embedding(entity_id)
    }

    pub fn search_entity_embeddings(&self, query: &[f32], k: usize) -> StorageResult<Vec<(Uuid, f32)>> {
        self.vectors.search_entity_embeddings(query, k)
    }

    // ── Analytics (spec §2 supplement) ───────────────────────────────────

    pub fn analytics_entity_counts(&self) -> StorageResult<HashMap<String, usize>> {
        self.relational.analytics_entity_counts()
    }

    pub fn analytics_relationship_counts(&self) -> StorageResult<HashMap<String, usize>> {
        self.relational.analytics_relationship_counts()
    }

    pub fn analytics_state_changes_by_date(&self) -> StorageResult<HashMap<String, usize>> {
        self.relational.analytics_state_changes_by_date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> Store {
        let dir = std::env::temp_dir().join(format!("meetgraph-store-test-{name}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap()
    }

    #[test]
    fn save_memories_is_searchable_immediately() {
        let store = temp_store("searchable");
        let meeting = Meeting {
            id: Uuid::new_v4(),
            title: "Weekly Sync".to_string(),
            transcript: "...".to_string(),
            participants: vec![],
            date: chrono::Utc::now(),
            summary: None,
            topics: vec![],
            key_decisions: vec![],
            action_items: vec![],
            created_at: chrono::Utc::now(),
            memory_count: 1,
            entity_count: 0,
        };
        store.save_meeting(&meeting).unwrap();

        let memory = Memory {
            id: Uuid::new_v4(),
            meeting_id: meeting.id,
            content: "the api migration is blocked on vendor access".to_string(),
            speaker: Some("Dana".to_string()),
            timestamp: chrono::Utc::now(),
            metadata: Default::default(),
            entity_mentions: vec![],
            embedding_id: None,
            created_at: chrono::Utc::now(),
        };
        store.save_memories(&[memory.clone()], &[vec![1.0, 0.0, 0.0]]).unwrap();

        let filters = MemorySearchFilters::default();
        let results = store.search_memories(&[1.0, 0.0, 0.0], &filters, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.id, memory.id);
        assert_eq!(results[0].meeting.id, meeting.id);
    }
}
