//! Model fallback chain (spec §4.4): try each configured model in order,
//! requesting JSON-mode where possible and falling back to an
//! instruct-then-extract strategy, advancing to the next model on any
//! HTTP error or schema violation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::client::{backoff_delay, strip_code_fence, supports_json_mode, ChatMessage, LlmClient};
use crate::error::{LlmError, LlmResult};

/// Counters exposed via [`ModelFallbackChain::stats`] (spec §4.4: "cache
/// hit rate, fallback count, model count").
#[derive(Debug, Default)]
pub struct FallbackStats {
    /// Number of `complete_json` calls that succeeded on a model other
    /// than the first (i.e. required at least one fallback).
    pub fallback_count: AtomicU64,
    /// Number of `complete_json` calls where every configured model
    /// failed, forcing the caller to its own deterministic fallback.
    pub all_models_failed_count: AtomicU64,
}

pub struct ModelFallbackChain {
    client: Arc<dyn LlmClient>,
    models: Vec<String>,
    max_retries: u32,
    pub stats: FallbackStats,
}

impl ModelFallbackChain {
    pub fn new(client: Arc<dyn LlmClient>, models: Vec<String>, max_retries: u32) -> Self {
        Self { client, models, max_retries, stats: FallbackStats::default() }
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn client(&self) -> Arc<dyn LlmClient> {
        Arc::clone(&self.client)
    }

    /// Try every model in order, each with capped exponential backoff
    /// retries, until one returns a response that parses as JSON. Returns
    /// the parsed value and the model that produced it.
    pub async fn complete_json(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> LlmResult<(Value, String)> {
        for (model_idx, model) in self.models.iter().enumerate() {
            match self.try_model(model, messages, temperature, max_tokens).await {
                Ok(value) => {
                    if model_idx > 0 {
                        self.stats.fallback_count.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok((value, model.clone()));
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "model failed, advancing fallback chain");
                }
            }
        }
        self.stats.all_models_failed_count.fetch_add(1, Ordering::Relaxed);
        Err(LlmError::AllModelsFailed)
    }

    async fn try_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> LlmResult<Value> {
        let mut last_err = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            // First attempt per model asks for native JSON mode, except on
            // models known to reject or ignore `response_format`
            // (`supports_json_mode`); those — and any retry after a first
            // failure — fall through to instructing the model to emit JSON
            // only and extracting it defensively.
            let json_mode = attempt == 0 && supports_json_mode(model);
            let result = self
                .client
                .chat_completion(model, messages, json_mode, temperature, max_tokens)
                .await;

            match result {
                Ok(raw) => {
                    let candidate = strip_code_fence(&raw);
                    match serde_json::from_str::<Value>(candidate) {
                        Ok(value) => return Ok(value),
                        Err(err) => last_err = Some(LlmError::Parse(err.to_string())),
                    }
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(LlmError::AllModelsFailed))
    }
}
