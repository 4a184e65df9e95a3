//! Context assembly (spec §4.7 step 3), ported from
//! `query_engine_v2._build_query_context` and `_filter_entities_by_state`.

use std::collections::HashMap;

use meetgraph_core::{Entity, QueryIntent, SearchResult};
use meetgraph_embeddings::EmbeddingEngine;
use meetgraph_storage::relational::{RelationshipView, TimelineEntry};
use meetgraph_storage::vector::MemorySearchFilters;
use meetgraph_storage::Store;
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueryResult;

/// How many memories the semantic search always pulls in, regardless of
/// intent (spec §4.7 step 3: "Always run a semantic memory search (k=20)").
const MEMORY_SEARCH_K: usize = 20;

/// Everything a handler needs to answer one classified query: the mentioned
/// entities plus their full history, and a semantic memory search run
/// unconditionally against the query text.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub query: String,
    pub intent: QueryIntent,
    pub entities: Vec<Entity>,
    pub memories: Vec<SearchResult>,
    pub timelines: HashMap<Uuid, Vec<TimelineEntry>>,
    pub relationships: HashMap<Uuid, Vec<RelationshipView>>,
}

/// Loads every mentioned entity's timeline and relationships, and runs the
/// unconditional semantic memory search (spec §4.7 step 3).
pub fn build_context(
    store: &Store,
    embeddings: &EmbeddingEngine,
    query: &str,
    intent: QueryIntent,
) -> QueryResult<QueryContext> {
    let mut entities = Vec::new();
    let mut timelines = HashMap::new();
    let mut relationships = HashMap::new();

    for entity_name in &intent.entities {
        let Some(entity) = store.get_entity_by_name(entity_name, None)? else {
            continue;
        };
        let timeline = store.get_entity_timeline(entity.id)?;
        let edges = store.get_entity_relationships(entity.id, true)?;
        timelines.insert(entity.id, timeline);
        relationships.insert(entity.id, edges);
        entities.push(entity);
    }

    let query_vector = embeddings.encode(query);
    let memories = store.search_memories(&query_vector, &MemorySearchFilters::default(), MEMORY_SEARCH_K)?;

    Ok(QueryContext {
        query: query.to_string(),
        intent,
        entities,
        memories,
        timelines,
        relationships,
    })
}

/// Filters entities by their current state, supporting plain equality
/// filters and `{"$exists": bool}` existence checks (ported from
/// `_filter_entities_by_state`). `entities` defaults to every entity in
/// storage when `None`.
pub fn filter_entities_by_state(
    store: &Store,
    filter: &HashMap<String, Value>,
    entities: Option<Vec<Entity>>,
) -> QueryResult<Vec<Entity>> {
    let candidates = match entities {
        Some(e) => e,
        None => store.get_all_entities(None, None, 0)?,
    };

    let mut filtered = Vec::new();
    for entity in candidates {
        let Some(current_state) = store.get_entity_current_state(entity.id)? else {
            continue;
        };
        if state_matches(&current_state.state, filter) {
            filtered.push(entity);
        }
    }
    Ok(filtered)
}

fn state_matches(state: &HashMap<String, Value>, filter: &HashMap<String, Value>) -> bool {
    for (key, expected) in filter {
        let actual = state.get(key);
        if let Some(exists_flag) = expected.get("$exists").and_then(Value::as_bool) {
            let present = actual.is_some();
            if exists_flag != present {
                return false;
            }
            continue;
        }
        if actual != Some(expected) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::EntityType;
    use meetgraph_storage::Store;
    use serde_json::json;

    fn temp_store() -> Store {
        let dir = std::env::temp_dir().join(format!("meetgraph-query-context-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap()
    }

    #[test]
    fn filters_by_equality() {
        let store = temp_store();
        let entity = Entity::new(EntityType::Project, "Project Alpha");
        store.save_entities(std::slice::from_ref(&entity)).unwrap();
        store
            .save_entity_states(&[meetgraph_core::EntityState {
                id: Uuid::new_v4(),
                entity_id: entity.id,
                state: HashMap::from([("status".to_string(), json!("blocked"))]),
                meeting_id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
                confidence: 1.0,
            }])
            .unwrap();

        let filter = HashMap::from([("status".to_string(), json!("blocked"))]);
        let matched = filter_entities_by_state(&store, &filter, None).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, entity.id);
    }

    #[test]
    fn filters_by_exists() {
        let store = temp_store();
        let entity = Entity::new(EntityType::Project, "Project Beta");
        store.save_entities(std::slice::from_ref(&entity)).unwrap();
        store
            .save_entity_states(&[meetgraph_core::EntityState {
                id: Uuid::new_v4(),
                entity_id: entity.id,
                state: HashMap::from([("assigned_to".to_string(), json!("Alice"))]),
                meeting_id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
                confidence: 1.0,
            }])
            .unwrap();

        let filter = HashMap::from([("assigned_to".to_string(), json!({"$exists": true}))]);
        let matched = filter_entities_by_state(&store, &filter, None).unwrap();
        assert_eq!(matched.len(), 1);

        let filter_absent = HashMap::from([("blockers".to_string(), json!({"$exists": true}))]);
        let matched_absent = filter_entities_by_state(&store, &filter_absent, None).unwrap();
        assert!(matched_absent.is_empty());
    }
}
