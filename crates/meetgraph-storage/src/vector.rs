//! Embedded vector half of the store (spec §4.2, §6): two named
//! collections — memory embeddings and entity-name embeddings — both
//! 384-dim cosine, upsert by id, top-k search with optional equality
//! filters on payload fields.
//!
//! Configuration still names a `vector_host`/`vector_port` pair, a nod to
//! the out-of-process vector databases this could front in a larger
//! deployment, but this crate keeps vectors in the same [`redb`] file as
//! the relational tables and searches them with a brute-force cosine scan.
//! That's the right trade at this corpus size (hundreds to low thousands
//! of memories/entities per deployment) and it keeps the workspace free of
//! a network dependency it cannot exercise in tests.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StorageResult;

const MEMORY_VECTORS: TableDefinition<&str, &[u8]> = TableDefinition::new("memory_vectors");
const ENTITY_VECTORS: TableDefinition<&str, &[u8]> = TableDefinition::new("entity_vectors");

/// Payload stored alongside each memory embedding (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryVectorPayload {
    pub meeting_id: Uuid,
    pub content: String,
    pub speaker: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Value>,
    #[serde(default)]
    pub entity_mentions: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryVectorRecord {
    vector: Vec<f32>,
    payload: MemoryVectorPayload,
}

/// Equality filters applied before scoring (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct MemorySearchFilters {
    pub meeting_id: Option<Uuid>,
    pub entity_mentions: Option<Vec<Uuid>>,
}

impl MemorySearchFilters {
    fn matches(&self, payload: &MemoryVectorPayload) -> bool {
        if let Some(meeting_id) = self.meeting_id {
            if payload.meeting_id != meeting_id {
                return false;
            }
        }
        if let Some(wanted) = &self.entity_mentions {
            if !wanted.iter().any(|id| payload.entity_mentions.contains(id)) {
                return false;
            }
        }
        true
    }
}

/// One raw hit from a memory search, before the relational join into a
/// full [`meetgraph_core::SearchResult`].
pub struct MemoryHit {
    pub memory_id: Uuid,
    pub score: f32,
    pub payload: MemoryVectorPayload,
}

pub struct VectorStore {
    db: Database,
}

impl VectorStore {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        {
            let tx = db.begin_write()?;
            tx.open_table(MEMORY_VECTORS)?;
            tx.open_table(ENTITY_VECTORS)?;
            tx.commit()?;
        }
        Ok(Self { db })
    }

    pub fn save_memory_vector(&self, memory_id: Uuid, vector: Vec<f32>, payload: MemoryVectorPayload) -> StorageResult<()> {
        let record = MemoryVectorRecord { vector, payload };
        let bytes = serde_json::to_vec(&record)?;
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(MEMORY_VECTORS)?;
            tbl.insert(memory_id.to_string().as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn save_memory_vectors(&self, batch: Vec<(Uuid, Vec<f32>, MemoryVectorPayload)>) -> StorageResult<()> {
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(MEMORY_VECTORS)?;
            for (memory_id, vector, payload) in batch {
                let record = MemoryVectorRecord { vector, payload };
                let bytes = serde_json::to_vec(&record)?;
                tbl.insert(memory_id.to_string().as_str(), bytes.as_slice())?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn search_memories(&self, query: &[f32], filters: &MemorySearchFilters, k: usize) -> StorageResult<Vec<MemoryHit>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(MEMORY_VECTORS)?;

        let mut scored = Vec::new();
        for row in tbl.iter()? {
            let (key, value) = row?;
            let record: MemoryVectorRecord = serde_json::from_slice(value.value())?;
            if !filters.matches(&record.payload) {
                continue;
            }
            let score = cosine_similarity(query, &record.vector);
            let memory_id = Uuid::parse_str(key.value()).unwrap_or_default();
            scored.push(MemoryHit { memory_id, score, payload: record.payload });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn save_entity_embedding(&self, entity_id: Uuid, vector: Vec<f32>) -> StorageResult<()> {
        let bytes = serde_json::to_vec(&vector)?;
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(ENTITY_VECTORS)?;
            tbl.insert(entity_id.to_string().as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_entity_embedding(&self, entity_id: Uuid) -> StorageResult<Option<Vec<f32>>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(ENTITY_VECTORS)?;
        match tbl.get(entity_id.to_string().as_str())? {
            None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        }
    }

    pub fn search_entity_embeddings(&self, query: &[f32], k: usize) -> StorageResult<Vec<(Uuid, f32)>> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(ENTITY_VECTORS)?;

        let mut scored = Vec::new();
        for row in tbl.iter()? {
            let (key, value) = row?;
            let vector: Vec<f32> = serde_json::from_slice(value.value())?;
            let score = cosine_similarity(query, &vector);
            if let Ok(id) = Uuid::parse_str(key.value()) {
                scored.push((id, score));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity, normalizing defensively so callers can pass raw
/// vectors regardless of whether the producing embedder already normalized
/// them (spec §4.1: "inputs must already be normalized or will be
/// normalized internally").
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-9 || norm_b < 1e-9 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("meetgraph-vector-test-{name}-{}.redb", Uuid::new_v4()))
    }

    #[test]
    fn entity_embedding_round_trips() {
        let path = temp_path("entity-roundtrip");
        let store = VectorStore::open(&path).unwrap();
        let id = Uuid::new_v4();
        store.save_entity_embedding(id, vec![1.0, 0.0, 0.0]).unwrap();
        let fetched = store.get_entity_embedding(id).unwrap().unwrap();
        assert_eq!(fetched, vec![1.0, 0.0, 0.0]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn search_entity_embeddings_ranks_by_similarity() {
        let path = temp_path("entity-search");
        let store = VectorStore::open(&path).unwrap();
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        store.save_entity_embedding(close, vec![1.0, 0.0]).unwrap();
        store.save_entity_embedding(far, vec![0.0, 1.0]).unwrap();

        let hits = store.search_entity_embeddings(&[0.9, 0.1], 2).unwrap();
        assert_eq!(hits[0].0, close);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn search_memories_respects_meeting_filter() {
        let path = temp_path("memory-search");
        let store = VectorStore::open(&path).unwrap();
        let meeting_a = Uuid::new_v4();
        let meeting_b = Uuid::new_v4();

        let payload_a = MemoryVectorPayload {
            meeting_id: meeting_a,
            content: "alpha is blocked".to_string(),
            speaker: None,
            timestamp: Utc::now(),
            metadata: Default::default(),
            entity_mentions: vec![],
        };
        let payload_b = MemoryVectorPayload {
            meeting_id: meeting_b,
            content: "beta is on track".to_string(),
            speaker: None,
            timestamp: Utc::now(),
            metadata: Default::default(),
            entity_mentions: vec![],
        };
        store.save_memory_vector(Uuid::new_v4(), vec![1.0, 0.0], payload_a).unwrap();
        store.save_memory_vector(Uuid::new_v4(), vec![1.0, 0.0], payload_b).unwrap();

        let filters = MemorySearchFilters { meeting_id: Some(meeting_a), entity_mentions: None };
        let hits = store.search_memories(&[1.0, 0.0], &filters, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.meeting_id, meeting_a);

        let _ = std::fs::remove_file(&path);
    }
}
