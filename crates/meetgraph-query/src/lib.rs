//! The natural-language query engine (spec §4.7): classifies a query's
//! intent, assembles a context of mentioned entities and a semantic memory
//! search, dispatches to a typed payload builder, and synthesizes an answer
//! through the LLM processor with a templated fallback. Six steps, one
//! module each:
//!
//! 1. [`intent::classify_intent`] — pattern/keyword scoring over seven intents.
//! 2. [`intent::extract_query_entities`], [`intent::extract_time_range`] — query parsing.
//! 3. [`context::build_context`] — entity timelines, relationships, semantic search.
//! 4. [`handlers`], [`analytics`] — per-intent typed payloads.
//! 5. [`synthesis::synthesize_answer`] — LLM answer with templated fallback.
//! 6. [`synthesis::generate_follow_ups`] — deterministic next-question templates.
//!
//! The query engine never mutates storage.

pub mod analytics;
pub mod context;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod synthesis;

use chrono::Utc;
use meetgraph_core::{IntentKind, QueryAnswer};
use meetgraph_embeddings::EmbeddingEngine;
use meetgraph_llm::LlmProcessor;
use meetgraph_storage::Store;
use tracing::instrument;

pub use error::{QueryError, QueryResult};

/// Everything the query engine needs across calls: storage, the embedding
/// engine used to vectorize query text, the LLM processor used for answer
/// synthesis, and the timeline display limit from configuration.
pub struct QueryEngine {
    store: Store,
    embeddings: EmbeddingEngine,
    llm: LlmProcessor,
    timeline_display_limit: usize,
}

impl QueryEngine {
    pub fn new(store: Store, embeddings: EmbeddingEngine, llm: LlmProcessor, timeline_display_limit: usize) -> Self {
        Self { store, embeddings, llm, timeline_display_limit }
    }

    /// Runs the full six-step pipeline against one natural-language query
    /// and returns a `QueryAnswer` with a populated intent, answer,
    /// supporting data, and follow-up suggestions.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn process_query(&self, query: &str) -> QueryResult<QueryAnswer> {
        let known_entities = self.store.get_all_entities(None, None, 0)?;
        let intent = intent::classify_intent(query, &known_entities, Utc::now());
        let intent_type = intent.intent_type;

        let context = context::build_context(&self.store, &self.embeddings, query, intent)?;

        let handler_output = match intent_type {
            IntentKind::Timeline => handlers::handle_timeline(&context, self.timeline_display_limit),
            IntentKind::Blocker => handlers::handle_blocker(&self.store, &context)?,
            IntentKind::Status => handlers::handle_status(&context),
            IntentKind::Ownership => handlers::handle_ownership(&self.store, &context)?,
            IntentKind::Analytics => {
                let payload = analytics::handle_analytics(&self.store)?;
                handlers::HandlerOutput { payload, entities_involved: context.entities.iter().map(|e| e.id).collect() }
            }
            IntentKind::Relationship => handlers::handle_relationship(&context),
            IntentKind::Search => handlers::handle_search(&context),
        };

        let (answer, confidence) = synthesis::synthesize_answer(&self.llm, &context, &handler_output.payload).await;
        let follow_up_suggestions = synthesis::generate_follow_ups(&context);

        Ok(QueryAnswer {
            query: context.query.clone(),
            intent: context.intent.clone(),
            answer,
            supporting_data: handler_output.payload,
            entities_involved: handler_output.entities_involved,
            confidence,
            follow_up_suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::{Entity, EntityRelationship, EntityState, EntityType, RelationshipType};
    use meetgraph_llm::{ChatMessage, LlmClient, LlmError, LlmResult};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    struct StubClient;

    #[async_trait::async_trait]
    impl LlmClient for StubClient {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _json_mode: bool,
            _temperature: f32,
            _max_tokens: u32,
        ) -> LlmResult<String> {
            Err(LlmError::AllModelsFailed)
        }
    }

    fn temp_store() -> Store {
        let dir = std::env::temp_dir().join(format!("meetgraph-query-lib-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Store::open(dir.join("relational.redb"), dir.join("vectors.redb")).unwrap()
    }

    fn engine_with_store(store: Store) -> QueryEngine {
        let client: Arc<dyn LlmClient> = Arc::new(StubClient);
        let llm = LlmProcessor::new(client, vec!["stub-model".to_string()], 1, Duration::from_secs(60));
        QueryEngine::new(store, EmbeddingEngine::default(), llm, 10)
    }

    #[tokio::test]
    async fn ownership_query_falls_back_to_templated_answer_on_llm_failure() {
        let store = temp_store();
        let alice = Entity::new(EntityType::Person, "Alice");
        let alpha = Entity::new(EntityType::Project, "Project Alpha");
        store.save_entities(&[alice.clone(), alpha.clone()]).unwrap();
        store
            .save_relationships(&[EntityRelationship {
                id: Uuid::new_v4(),
                from_entity_id: alice.id,
                to_entity_id: alpha.id,
                relationship_type: RelationshipType::Owns,
                attributes: HashMap::new(),
                meeting_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                active: true,
            }])
            .unwrap();

        let engine = engine_with_store(store);
        let answer = engine.process_query("Who owns Project Alpha?").await.unwrap();

        assert_eq!(answer.intent.intent_type, IntentKind::Ownership);
        assert!(answer.confidence > 0.0);
        assert!(answer.follow_up_suggestions.len() <= 3);
    }

    #[tokio::test]
    async fn blocker_query_finds_blocked_entity_by_state() {
        let store = temp_store();
        let project = Entity::new(EntityType::Project, "Project Beta");
        store.save_entities(std::slice::from_ref(&project)).unwrap();
        store
            .save_entity_states(&[EntityState {
                id: Uuid::new_v4(),
                entity_id: project.id,
                state: HashMap::from([
                    ("status".to_string(), serde_json::json!("blocked")),
                    ("blockers".to_string(), serde_json::json!(["vendor access"])),
                ]),
                meeting_id: Uuid::new_v4(),
                timestamp: Utc::now(),
                confidence: 1.0,
            }])
            .unwrap();

        let engine = engine_with_store(store);
        let answer = engine.process_query("what's blocking Project Beta?").await.unwrap();

        assert_eq!(answer.intent.intent_type, IntentKind::Blocker);
        assert_eq!(answer.entities_involved, vec![project.id]);
    }

    #[tokio::test]
    async fn search_query_on_empty_store_still_returns_an_answer() {
        let store = temp_store();
        let engine = engine_with_store(store);
        let answer = engine.process_query("tell me about anything interesting").await.unwrap();
        assert_eq!(answer.intent.intent_type, IntentKind::Search);
        assert!(!answer.answer.is_empty());
    }
}
