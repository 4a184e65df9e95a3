//! Stage 8 (spec §4.6): memory mention rewriting. Each extracted memory's
//! free-text `entity_mentions` become resolved entity ids — in-meeting map
//! first, then a direct name lookup, then the full resolver — before the
//! assembled `Memory` and its caller-supplied embedding are persisted
//! together through [`Store::save_memories`].

use std::collections::HashMap;

use chrono::Utc;
use meetgraph_core::{Entity, ExtractedMemory, Memory};
use meetgraph_resolver::EntityResolver;
use meetgraph_storage::Store;
use uuid::Uuid;

use crate::error::{ProcessorError, ProcessorResult};

/// Builds and persists one [`Memory`] per `memories`/`vectors` pair. The two
/// slices must be the same length and in the same order as produced by
/// extraction — the caller is responsible for embedding memory content
/// before calling this stage.
pub async fn process_memories(
    store: &Store,
    resolver: &EntityResolver,
    entity_map: &HashMap<String, Entity>,
    memories: &[ExtractedMemory],
    vectors: &[Vec<f32>],
    meeting_id: Uuid,
) -> ProcessorResult<Vec<Memory>> {
    if memories.len() != vectors.len() {
        return Err(ProcessorError::Resolution(meetgraph_core::CoreError::InvalidInput(format!(
            "{} memories but {} vectors",
            memories.len(),
            vectors.len()
        ))));
    }

    let mut built = Vec::with_capacity(memories.len());
    for raw in memories {
        let mut entity_ids = Vec::new();
        for mention in &raw.entity_mentions {
            if let Some(id) = resolve_mention(store, resolver, entity_map, mention).await? {
                if !entity_ids.contains(&id) {
                    entity_ids.push(id);
                }
            }
        }

        let now = Utc::now();
        built.push(Memory {
            id: Uuid::new_v4(),
            meeting_id,
            content: raw.content.clone(),
            speaker: raw.speaker.clone(),
            timestamp: now,
            metadata: raw.metadata.clone(),
            entity_mentions: entity_ids,
            embedding_id: None,
            created_at: now,
        });
    }

    if !built.is_empty() {
        store.save_memories(&built, vectors)?;
    }
    Ok(built)
}

async fn resolve_mention(
    store: &Store,
    resolver: &EntityResolver,
    entity_map: &HashMap<String, Entity>,
    mention: &str,
) -> ProcessorResult<Option<Uuid>> {
    let trimmed = mention.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Some(entity) = entity_map.get(trimmed) {
        return Ok(Some(entity.id));
    }
    if let Some(entity) = store.get_entity_by_name(trimmed, None)? {
        return Ok(Some(entity.id));
    }
    let matches = resolver.resolve_entities(&[trimmed.to_string()], None).await?;
    Ok(matches.into_iter().next().and_then(|m| m.entity).map(|e| e.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_config::ResolutionConfig;
    use meetgraph_core::EntityType;
    use meetgraph_embeddings::EmbeddingEngine;
    use std::sync::Arc;

    fn temp_store() -> Arc<Store> {
        let dir = std::env::temp_dir().join(format!("meetgraph-processor-memories-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Arc::new(Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap())
    }

    fn resolver(store: Arc<Store>) -> EntityResolver {
        EntityResolver::new(store, Arc::new(EmbeddingEngine::default()), None, ResolutionConfig::default())
    }

    #[tokio::test]
    async fn rewrites_mentions_to_resolved_entity_ids() {
        let store = temp_store();
        let alice = Entity::new(EntityType::Person, "Alice");
        store.save_entities(&[alice.clone()]).unwrap();

        let mut entity_map = HashMap::new();
        entity_map.insert("Alice".to_string(), alice.clone());

        let resolver = resolver(Arc::clone(&store));
        let raw = vec![ExtractedMemory {
            content: "Alice reported the migration is blocked.".to_string(),
            speaker: Some("Alice".to_string()),
            entity_mentions: vec!["Alice".to_string()],
            metadata: HashMap::new(),
        }];

        let meeting_id = Uuid::new_v4();
        let memories = process_memories(&store, &resolver, &entity_map, &raw, &[vec![1.0, 0.0]], meeting_id).await.unwrap();

        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].entity_mentions, vec![alice.id]);
        assert_eq!(store.get_memory(memories[0].id).unwrap().unwrap().id, memories[0].id);
    }

    #[tokio::test]
    async fn unresolvable_mention_is_dropped_not_errored() {
        let store = temp_store();
        let resolver = resolver(Arc::clone(&store));
        let raw = vec![ExtractedMemory {
            content: "Someone mentioned an unknown initiative.".to_string(),
            speaker: None,
            entity_mentions: vec!["Nonexistent Thing".to_string()],
            metadata: HashMap::new(),
        }];

        let memories = process_memories(&store, &resolver, &HashMap::new(), &raw, &[vec![0.0, 1.0]], Uuid::new_v4()).await.unwrap();
        assert!(memories[0].entity_mentions.is_empty());
    }

    #[tokio::test]
    async fn mismatched_lengths_is_an_error() {
        let store = temp_store();
        let resolver = resolver(Arc::clone(&store));
        let raw = vec![ExtractedMemory {
            content: "x".to_string(),
            speaker: None,
            entity_mentions: vec![],
            metadata: HashMap::new(),
        }];
        let result = process_memories(&store, &resolver, &HashMap::new(), &raw, &[], Uuid::new_v4()).await;
        assert!(result.is_err());
    }
}
