//! Stage 7 (spec §4.6): relationship processing. Endpoints resolve against
//! the in-meeting entity map first, then a direct name lookup, then the
//! full resolver — the same order memory mentions resolve in (§8).
//! Relationship-type validation always succeeds after normalization
//! (unknown types default to `relates_to`, spec §6); dedup against
//! existing active relationships is the storage layer's job.

use std::collections::HashMap;

use chrono::Utc;
use meetgraph_core::{normalize_relationship_type, Entity, EntityRelationship, ExtractedRelationship};
use meetgraph_resolver::EntityResolver;
use meetgraph_storage::Store;
use tracing::warn;
use uuid::Uuid;

use crate::error::ProcessorResult;

/// Resolves every extracted relationship's endpoints and persists the
/// result, skipping any relationship whose `from` or `to` can't be
/// resolved to a known entity.
pub async fn process_relationships(
    store: &Store,
    resolver: &EntityResolver,
    entity_map: &HashMap<String, Entity>,
    relationships: &[ExtractedRelationship],
    meeting_id: Uuid,
) -> ProcessorResult<Vec<EntityRelationship>> {
    let mut fresh = Vec::with_capacity(relationships.len());

    for raw in relationships {
        let Some(from) = resolve_endpoint(store, resolver, entity_map, &raw.from).await? else {
            warn!(from = %raw.from, to = %raw.to, "skipping relationship: unresolved source endpoint");
            continue;
        };
        let Some(to) = resolve_endpoint(store, resolver, entity_map, &raw.to).await? else {
            warn!(from = %raw.from, to = %raw.to, "skipping relationship: unresolved target endpoint");
            continue;
        };

        fresh.push(EntityRelationship {
            id: Uuid::new_v4(),
            from_entity_id: from.id,
            to_entity_id: to.id,
            relationship_type: normalize_relationship_type(&raw.relationship_type),
            attributes: raw.attributes.clone(),
            meeting_id,
            timestamp: Utc::now(),
            active: true,
        });
    }

    if fresh.is_empty() {
        return Ok(Vec::new());
    }
    Ok(store.save_relationships(&fresh)?)
}

async fn resolve_endpoint(
    store: &Store,
    resolver: &EntityResolver,
    entity_map: &HashMap<String, Entity>,
    name: &str,
) -> ProcessorResult<Option<Entity>> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Some(entity) = entity_map.get(trimmed) {
        return Ok(Some(entity.clone()));
    }
    if let Some(entity) = store.get_entity_by_name(trimmed, None)? {
        return Ok(Some(entity));
    }
    let matches = resolver.resolve_entities(&[trimmed.to_string()], None).await?;
    Ok(matches.into_iter().next().and_then(|m| m.entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_config::ResolutionConfig;
    use meetgraph_core::{Entity, EntityType};
    use meetgraph_embeddings::EmbeddingEngine;
    use std::sync::Arc;

    fn temp_store() -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("meetgraph-processor-relationships-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Arc::new(Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap())
    }

    fn resolver(store: Arc<Store>) -> EntityResolver {
        EntityResolver::new(store, Arc::new(EmbeddingEngine::default()), None, ResolutionConfig::default())
    }

    #[tokio::test]
    async fn resolves_endpoints_from_in_meeting_map() {
        let store = temp_store();
        let alice = Entity::new(EntityType::Person, "Alice");
        let project = Entity::new(EntityType::Project, "Project Alpha");
        store.save_entities(&[alice.clone(), project.clone()]).unwrap();

        let mut entity_map = HashMap::new();
        entity_map.insert("Alice".to_string(), alice.clone());
        entity_map.insert("Project Alpha".to_string(), project.clone());

        let resolver = resolver(Arc::clone(&store));
        let raw = vec![ExtractedRelationship {
            from: "Alice".to_string(),
            to: "Project Alpha".to_string(),
            relationship_type: "owns".to_string(),
            attributes: HashMap::new(),
        }];

        let meeting_id = Uuid::new_v4();
        let persisted = process_relationships(&store, &resolver, &entity_map, &raw, meeting_id).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].from_entity_id, alice.id);
        assert_eq!(persisted[0].to_entity_id, project.id);
    }

    #[tokio::test]
    async fn unresolvable_endpoint_is_skipped() {
        let store = temp_store();
        let alice = Entity::new(EntityType::Person, "Alice");
        store.save_entities(&[alice.clone()]).unwrap();

        let mut entity_map = HashMap::new();
        entity_map.insert("Alice".to_string(), alice);

        let resolver = resolver(Arc::clone(&store));
        let raw = vec![ExtractedRelationship {
            from: "Alice".to_string(),
            to: "Nonexistent Thing Entirely".to_string(),
            relationship_type: "owns".to_string(),
            attributes: HashMap::new(),
        }];

        let persisted = process_relationships(&store, &resolver, &entity_map, &raw, Uuid::new_v4()).await.unwrap();
        assert!(persisted.is_empty());
    }
}
