//! Batched, cached, fallback-guarded LLM access (spec §4.4). This crate is
//! the workspace's only direct HTTP boundary with the configured LLM
//! endpoint; the resolver, extractor, and query engine all build their
//! prompts on top of [`ModelFallbackChain::complete_json`] rather than
//! talking to `reqwest` themselves.

pub mod client;
pub mod error;
pub mod fallback;
pub mod processor;
pub mod ttl_cache;

use std::sync::Arc;
use std::time::Duration;

pub use client::{ChatMessage, LlmClient, OpenAiCompatibleClient};
pub use error::{LlmError, LlmResult};
pub use fallback::{FallbackStats, ModelFallbackChain};
pub use processor::{deterministic_diff, LlmProcessor, LlmProcessorStats, StateComparison};
pub use ttl_cache::TtlCache;

/// Build a [`LlmProcessor`] (and, via [`ModelFallbackChain::new`] inside
/// it, its model list) from workspace configuration: primary model first,
/// then the configured fallbacks, in order (spec §6).
pub fn build_processor(config: &meetgraph_config::AppConfig) -> LlmResult<LlmProcessor> {
    let client: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(&config.llm, &config.network)?);
    let mut models = vec![config.llm.model.clone()];
    models.extend(config.llm.model_fallbacks.iter().cloned());
    Ok(LlmProcessor::new(client, models, config.llm.max_retries, Duration::from_secs(config.llm.cache_ttl_s)))
}

/// Build a bare [`ModelFallbackChain`] for components that need generic
/// JSON completions without the state-comparison cache (the resolver's LLM
/// matching step, the extractor, the query engine's answer synthesis).
pub fn build_chain(config: &meetgraph_config::AppConfig) -> LlmResult<ModelFallbackChain> {
    let client: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(&config.llm, &config.network)?);
    let mut models = vec![config.llm.model.clone()];
    models.extend(config.llm.model_fallbacks.iter().cloned());
    Ok(ModelFallbackChain::new(client, models, config.llm.max_retries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use serde_json::json;

    #[test]
    fn deterministic_diff_single_field_change() {
        let old = HashMap::from([("status".to_string(), json!("in_progress"))]);
        let new = HashMap::from([("status".to_string(), json!("blocked"))]);
        let comparison = deterministic_diff(&old, &new);
        assert!(comparison.has_changes);
        assert_eq!(comparison.changed_fields, vec!["status"]);
        assert!(comparison.reason.contains("status"));
    }

    #[test]
    fn deterministic_diff_no_changes() {
        let old = HashMap::from([("status".to_string(), json!("planned"))]);
        let new = old.clone();
        let comparison = deterministic_diff(&old, &new);
        assert!(!comparison.has_changes);
        assert!(comparison.changed_fields.is_empty());
    }

    #[test]
    fn deterministic_diff_detects_additions_and_removals() {
        let old = HashMap::from([("status".to_string(), json!("in_progress"))]);
        let new = HashMap::from([
            ("status".to_string(), json!("blocked")),
            ("blockers".to_string(), json!(["vendor"])),
        ]);
        let comparison = deterministic_diff(&old, &new);
        assert!(comparison.changed_fields.contains(&"status".to_string()));
        assert!(comparison.changed_fields.contains(&"blockers".to_string()));
    }
}
