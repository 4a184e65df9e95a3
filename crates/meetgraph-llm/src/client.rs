//! OpenAI-compatible chat-completions client (spec §6) and the model
//! fallback chain that sits in front of it (spec §4.4).
//!
//! Ported from `aigent-llm`'s `OllamaClient`/`OpenRouterClient` pair: a thin
//! `reqwest` wrapper per provider plus a router that tries providers in
//! order. Here there is one provider shape (any OpenAI-compatible HTTPS
//! endpoint) and the "providers" are the configured model fallback chain
//! instead of Ollama vs. OpenRouter.

use std::time::Duration;

use async_trait::async_trait;
use meetgraph_config::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{LlmError, LlmResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// A single completion attempt against one model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request a chat completion. `json_mode` asks the endpoint for
    /// JSON-mode response formatting when the model is presumed to
    /// support it (spec §4.4); callers must still be defensive about
    /// markdown-fenced responses.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_mode: bool,
        temperature: f32,
        max_tokens: u32,
    ) -> LlmResult<String>;
}

/// The one concrete client the workspace ships: any HTTPS endpoint
/// speaking the OpenAI chat-completions wire format (spec §6).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig, network: &meetgraph_config::NetworkConfig) -> LlmResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .danger_accept_invalid_certs(!network.tls_verify);

        if let Some(proxy_url) = &network.https_proxy {
            if let Ok(proxy) = reqwest::Proxy::https(proxy_url) {
                builder = builder.proxy(proxy);
            }
        } else if let Some(proxy_url) = &network.http_proxy {
            if let Ok(proxy) = reqwest::Proxy::http(proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let http = builder.build().map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_mode: bool,
        temperature: f32,
        max_tokens: u32,
    ) -> LlmResult<String> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let mut payload = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Http(format!("{status}: {body}")));
        }

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::Parse(format!("response missing choices[0].message.content: {body}")))
    }
}

/// Whether `model` is presumed to support the OpenAI-style
/// `response_format: {"type": "json_object"}` request parameter (spec
/// §4.4: "JSON-response mode if the model supports it"). Ports the
/// original's `"anthropic" in model or "mistral" in model"` exclusion —
/// those providers reject or silently ignore `response_format`, so the
/// fallback chain falls through to prose JSON instructions plus
/// [`strip_code_fence`] instead.
pub fn supports_json_mode(model: &str) -> bool {
    let model = model.to_lowercase();
    !(model.contains("anthropic") || model.contains("mistral"))
}

/// Strip a markdown code fence around a JSON payload, if present (spec
/// §4.4: "extract JSON from any markdown fences" for models that can't be
/// told to emit raw JSON).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line (```json).
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.trim_start_matches(['\n', '\r']);
    match after_open.rfind("```") {
        Some(idx) => after_open[..idx].trim(),
        None => after_open.trim(),
    }
}

/// Capped exponential backoff (spec §5: "cap 10 s, max 3 attempts").
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(10);
    Duration::from_secs(secs)
}
