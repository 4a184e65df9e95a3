//! Stage 1 (spec §4.6): entity normalization and upsert. Extracted entities
//! already carry a validated, closed-enum `EntityType` (the extractor
//! rejects unknown types at its own boundary — spec §9), so this stage only
//! needs to skip blank names and upsert the rest.
//!
//! Ported from `processor.py::_process_entities`, this stage also generates
//! and persists each upserted entity's name embedding so the resolver's
//! vector-similarity strategy (spec §4.3) has something to search — the
//! original does this via `_generate_embeddings_async` right after
//! `storage.save_entities`, in the same processing step rather than a
//! separate background pass.

use std::collections::HashMap;

use meetgraph_core::{Entity, ExtractedEntity};
use meetgraph_embeddings::EmbeddingEngine;
use tracing::warn;

use crate::error::ProcessorResult;

/// Upserts every extracted entity, embeds and persists its name vector, and
/// returns a map from its extraction-time name to the stored (possibly
/// pre-existing) [`Entity`].
pub fn process_entities(
    store: &meetgraph_storage::Store,
    embeddings: &EmbeddingEngine,
    entities: &[ExtractedEntity],
) -> ProcessorResult<HashMap<String, Entity>> {
    let mut names = Vec::with_capacity(entities.len());
    let mut fresh = Vec::with_capacity(entities.len());

    for raw in entities {
        let name = raw.name.trim();
        if name.is_empty() {
            warn!(entity_type = %raw.entity_type, "skipping entity with empty name");
            continue;
        }
        names.push(name.to_string());
        fresh.push(Entity::new(raw.entity_type, name));
    }

    if fresh.is_empty() {
        return Ok(HashMap::new());
    }

    let stored = store.save_entities(&fresh)?;
    for entity in &stored {
        let vector = embeddings.encode(&entity.name);
        if let Err(err) = store.save_entity_embedding(entity.id, vector) {
            warn!(entity_id = %entity.id, error = %err, "failed to persist entity name embedding");
        }
    }
    Ok(names.into_iter().zip(stored).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::EntityType;
    use meetgraph_storage::Store;
    use uuid::Uuid;

    fn temp_store() -> Store {
        let dir = std::env::temp_dir().join(format!("meetgraph-processor-entities-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap()
    }

    #[test]
    fn skips_blank_names_and_upserts_the_rest() {
        let store = temp_store();
        let embeddings = EmbeddingEngine::default();
        let entities = vec![
            ExtractedEntity { name: "  ".to_string(), entity_type: EntityType::Project, current_state: HashMap::new() },
            ExtractedEntity { name: "Project Alpha".to_string(), entity_type: EntityType::Project, current_state: HashMap::new() },
        ];
        let map = process_entities(&store, &embeddings, &entities).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("Project Alpha"));
    }

    #[test]
    fn repeated_entity_reuses_existing_id() {
        let store = temp_store();
        let embeddings = EmbeddingEngine::default();
        let entities = vec![ExtractedEntity { name: "Project Alpha".to_string(), entity_type: EntityType::Project, current_state: HashMap::new() }];
        let first = process_entities(&store, &embeddings, &entities).unwrap();
        let second = process_entities(&store, &embeddings, &entities).unwrap();
        assert_eq!(first["Project Alpha"].id, second["Project Alpha"].id);
    }

    #[test]
    fn upsert_persists_a_searchable_name_embedding() {
        let store = temp_store();
        let embeddings = EmbeddingEngine::default();
        let entities = vec![ExtractedEntity { name: "Project Alpha".to_string(), entity_type: EntityType::Project, current_state: HashMap::new() }];
        let map = process_entities(&store, &embeddings, &entities).unwrap();

        let entity = &map["Project Alpha"];
        let stored_vector = store.get_entity_embedding(entity.id).unwrap();
        assert_eq!(stored_vector, Some(embeddings.encode(&entity.name)));

        let hits = store.search_entity_embeddings(&embeddings.encode("Project Alpha"), 5).unwrap();
        assert!(hits.iter().any(|(id, _)| *id == entity.id));
    }
}
