//! Exercises the two crates that compose a full round trip: ingest a
//! meeting through `meetgraph-processor`, then ask a natural-language
//! question about it through `QueryEngine`. The LLM is unreachable in
//! both halves, so this also confirms the whole pipeline degrades to its
//! deterministic fallbacks end to end rather than only in isolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meetgraph_config::ResolutionConfig;
use meetgraph_core::{EntityType, ExtractedEntity, ExtractedMemory, ExtractedRelationship, ExtractionResult, IntentKind};
use meetgraph_embeddings::EmbeddingEngine;
use meetgraph_llm::{ChatMessage, LlmClient, LlmError, LlmProcessor, LlmResult};
use meetgraph_processor::process_meeting;
use meetgraph_query::QueryEngine;
use meetgraph_resolver::EntityResolver;
use meetgraph_storage::Store;
use uuid::Uuid;

struct StubClient;

#[async_trait]
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

fn llm_processor() -> LlmProcessor {
    let client: Arc<dyn LlmClient> = Arc::new(StubClient);
    LlmProcessor::new(client, vec!["stub-model".to_string()], 1, Duration::from_secs(60))
}

fn sync_meeting_extraction() -> ExtractionResult {
    ExtractionResult {
        memories: vec![ExtractedMemory {
            content: "Alice said vendor access is blocking the rollout".to_string(),
            speaker: Some("Alice".to_string()),
            entity_mentions: vec!["Project Alpha".to_string()],
            metadata: HashMap::new(),
        }],
        entities: vec![
            ExtractedEntity {
                name: "Alice".to_string(),
                entity_type: EntityType::Person,
                current_state: HashMap::new(),
            },
            ExtractedEntity {
                name: "Project Alpha".to_string(),
                entity_type: EntityType::Project,
                current_state: HashMap::from([
                    ("status".to_string(), serde_json::json!("blocked")),
                    ("blockers".to_string(), serde_json::json!(["vendor access"])),
                ]),
            },
        ],
        relationships: vec![ExtractedRelationship {
            from: "Alice".to_string(),
            to: "Project Alpha".to_string(),
            relationship_type: "owns".to_string(),
            attributes: HashMap::new(),
        }],
        meeting_title: "Weekly Sync".to_string(),
        meeting_date: None,
        participants: vec!["Alice".to_string()],
        summary: "Alpha is blocked on vendor access.".to_string(),
        topics: vec!["Project Alpha".to_string()],
        key_decisions: vec![],
        action_items: vec![],
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn ingested_meeting_is_queryable_for_blockers_and_ownership() {
    let dir = std::env::temp_dir().join(format!("meetgraph-query-e2e-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let relational_path = dir.join("relational.redb");
    let vector_path = dir.join("vectors.redb");

    let embeddings = Arc::new(EmbeddingEngine::default());
    {
        let store = Arc::new(Store::open(&relational_path, &vector_path).unwrap());
        let resolver = EntityResolver::new(Arc::clone(&store), Arc::clone(&embeddings), None, ResolutionConfig::default());
        let llm = llm_processor();

        let summary = process_meeting(
            &store,
            &resolver,
            &llm,
            &embeddings,
            Uuid::new_v4(),
            "Alice: vendor access is still blocking Alpha's rollout.",
            sync_meeting_extraction(),
            &[vec![0.0; 384]],
        )
        .await
        .unwrap();
        assert_eq!(summary.entities.len(), 2);
        assert_eq!(summary.relationships.len(), 1);
    }

    // Ingestion's handles are dropped before the query engine reopens the
    // same on-disk store, matching how the processor and the query engine
    // run as separate components over shared storage in practice.
    let store = Store::open(&relational_path, &vector_path).unwrap();
    let engine = QueryEngine::new(store, (*embeddings).clone(), llm_processor(), 10);

    let blocker_answer = engine.process_query("what is blocking Project Alpha?").await.unwrap();
    assert_eq!(blocker_answer.intent.intent_type, IntentKind::Blocker);
    assert!(!blocker_answer.entities_involved.is_empty());

    let ownership_answer = engine.process_query("who owns Project Alpha?").await.unwrap();
    assert_eq!(ownership_answer.intent.intent_type, IntentKind::Ownership);
    assert!(!ownership_answer.answer.is_empty());
}
