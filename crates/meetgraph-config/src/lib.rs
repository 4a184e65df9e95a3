//! Settings for the meetgraph pipeline (spec §6): TOML on disk, a handful
//! of environment variable overrides for secrets and deployment-local
//! values, and `Default` impls for every section so a missing file or a
//! partial TOML document still produces a usable configuration.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default `tracing_subscriber::EnvFilter` directive string for whatever
/// embeds this pipeline. This workspace has no binary of its own (spec.md
/// §1 places the HTTP/CLI surface out of scope), so it can't call
/// `tracing_subscriber::fmt().init()` itself — it only hands the embedding
/// application a directive to pass through.
pub const DEFAULT_LOG_DIRECTIVE: &str = "meetgraph=info,warn";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub model_fallbacks: Vec<String>,
    pub timeout_s: u64,
    pub max_retries: u32,
    pub cache_ttl_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openrouter/cypher-alpha:free".to_string(),
            model_fallbacks: vec![
                "openai/gpt-4-turbo-preview".to_string(),
                "openai/gpt-3.5-turbo".to_string(),
                "mistralai/mixtral-8x7b-instruct".to_string(),
            ],
            timeout_s: 30,
            max_retries: 3,
            cache_ttl_s: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub host: String,
    pub port: u16,
    pub memories_collection: String,
    pub entities_collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6334,
            memories_collection: "memories".to_string(),
            entities_collection: "entities".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub relational_store_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            relational_store_path: "./meetgraph.redb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_path: String,
    pub max_length: usize,
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            max_length: 256,
            dim: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub vector_threshold: f32,
    pub fuzzy_threshold: f32,
    pub use_llm: bool,
    pub entity_cache_ttl_s: u64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            vector_threshold: 0.85,
            fuzzy_threshold: 0.75,
            use_llm: true,
            entity_cache_ttl_s: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub timeline_display_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeline_display_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub tls_verify: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_proxy: None,
            https_proxy: None,
            no_proxy: None,
            tls_verify: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub resolution: ResolutionConfig,
    pub query: QueryConfig,
    pub network: NetworkConfig,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults for any section missing
    /// from the file (and to an all-default config if the file itself is
    /// absent), then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// `MEETGRAPH_LLM_API_KEY` takes precedence over the TOML value so
    /// secrets never need to live on disk; proxy settings follow the usual
    /// `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` convention.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("MEETGRAPH_LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = key;
            }
        }
        if let Ok(url) = env::var("MEETGRAPH_LLM_BASE_URL") {
            if !url.is_empty() {
                self.llm.base_url = url;
            }
        }
        if let Ok(proxy) = env::var("HTTP_PROXY") {
            self.network.http_proxy = Some(proxy);
        }
        if let Ok(proxy) = env::var("HTTPS_PROXY") {
            self.network.https_proxy = Some(proxy);
        }
        if let Ok(no_proxy) = env::var("NO_PROXY") {
            self.network.no_proxy = Some(no_proxy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from("/nonexistent/meetgraph.toml").unwrap();
        assert_eq!(config.resolution.vector_threshold, 0.85);
        assert_eq!(config.embedding.dim, 384);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("meetgraph-config-test-{}", std::process::id()));
        let path = dir.join("meetgraph.toml");
        let mut config = AppConfig::default();
        config.llm.model = "openai/gpt-4-turbo-preview".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.llm.model, "openai/gpt-4-turbo-preview");
        let _ = fs::remove_dir_all(&dir);
    }
}
