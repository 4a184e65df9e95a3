//! The batching, cached, fallback-guarded LLM processor (spec §4.4): the
//! single entry point the meeting processor uses to compare old/new entity
//! states, plus the generic JSON-completion surface the resolver,
//! extractor, and query engine build their own prompts on top of.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::client::{ChatMessage, LlmClient};
use crate::error::LlmResult;
use crate::fallback::ModelFallbackChain;
use crate::ttl_cache::TtlCache;

/// The result of comparing one `(old, new)` state pair (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateComparison {
    pub has_changes: bool,
    pub changed_fields: Vec<String>,
    pub reason: String,
}

/// Snapshot of processor-wide counters (spec §4.4: "cache hit rate,
/// fallback count, model count").
#[derive(Debug, Clone, Default)]
pub struct LlmProcessorStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fallback_count: u64,
    pub deterministic_fallback_count: u64,
    pub model_count: usize,
}

/// Pairs per LLM call, to fit model context (spec §5 backpressure:
/// "implementers should chunk at ~100 pairs per call").
const COMPARISON_CHUNK_SIZE: usize = 100;

pub struct LlmProcessor {
    chain: ModelFallbackChain,
    cache: TtlCache<StateComparison>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    deterministic_fallback_count: AtomicU64,
}

impl LlmProcessor {
    pub fn new(client: Arc<dyn LlmClient>, models: Vec<String>, max_retries: u32, cache_ttl: Duration) -> Self {
        Self {
            chain: ModelFallbackChain::new(client, models, max_retries),
            cache: TtlCache::new(cache_ttl),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            deterministic_fallback_count: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> LlmProcessorStats {
        LlmProcessorStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            fallback_count: self.chain.stats.fallback_count.load(Ordering::Relaxed),
            deterministic_fallback_count: self.deterministic_fallback_count.load(Ordering::Relaxed),
            model_count: self.chain.model_count(),
        }
    }

    /// Compare every `(old, new)` pair, preserving input order (spec §4.4,
    /// P2: determinism under cache).
    pub async fn compare_states_batch(
        &self,
        pairs: &[(HashMap<String, Value>, HashMap<String, Value>)],
    ) -> LlmResult<Vec<StateComparison>> {
        let keys: Vec<String> = pairs.iter().map(|(old, new)| cache_key(old, new)).collect();

        let mut results: Vec<Option<StateComparison>> = Vec::with_capacity(pairs.len());
        let mut uncached_indices = Vec::new();
        for (idx, key) in keys.iter().enumerate() {
            match self.cache.get(key) {
                Some(cached) => {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    results.push(Some(cached));
                }
                None => {
                    self.cache_misses.fetch_add(1, Ordering::Relaxed);
                    results.push(None);
                    uncached_indices.push(idx);
                }
            }
        }

        for chunk in uncached_indices.chunks(COMPARISON_CHUNK_SIZE) {
            let chunk_pairs: Vec<(usize, &HashMap<String, Value>, &HashMap<String, Value>)> =
                chunk.iter().map(|&idx| (idx, &pairs[idx].0, &pairs[idx].1)).collect();

            let fresh = self.compare_chunk(&chunk_pairs).await;
            for (idx, comparison) in chunk.iter().zip(fresh.into_iter()) {
                self.cache.insert(keys[*idx].clone(), comparison.clone());
                results[*idx] = Some(comparison);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }

    async fn compare_chunk(
        &self,
        chunk: &[(usize, &HashMap<String, Value>, &HashMap<String, Value>)],
    ) -> Vec<StateComparison> {
        let prompt = build_comparison_prompt(chunk);
        let messages = vec![
            ChatMessage::system(
                "You compare pairs of entity state snapshots from business meetings. \
                 Ignore semantic no-ops (\"planning\" vs \"in planning phase\", \"30%\" vs \"30% complete\"). \
                 Flag genuine value changes, field additions, or field removals. \
                 Respond with a strict JSON array, one object per pair, each shaped exactly as: \
                 {\"index\": <int>, \"has_changes\": <bool>, \"changed_fields\": [<string>...], \"reason\": <string>}.",
            ),
            ChatMessage::user(prompt),
        ];

        match self.chain.complete_json(&messages, 0.0, 2000).await {
            Ok((value, _model)) => match parse_comparison_response(&value, chunk) {
                Some(parsed) => parsed,
                None => {
                    warn!("comparison response failed schema validation, falling back to deterministic diff");
                    self.deterministic_fallback_count.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    chunk.iter().map(|(_, old, new)| deterministic_diff(old, new)).collect()
                }
            },
            Err(err) => {
                warn!(error = %err, "all models failed for comparison chunk, falling back to deterministic diff");
                self.deterministic_fallback_count.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                chunk.iter().map(|(_, old, new)| deterministic_diff(old, new)).collect()
            }
        }
    }

    /// Generic JSON completion through this processor's fallback chain,
    /// for callers that need a one-off LLM call outside the state-
    /// comparison cache (spec §4.6 stage 6: transition reason refinement).
    pub async fn complete_json(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> LlmResult<(Value, String)> {
        self.chain.complete_json(messages, temperature, max_tokens).await
    }

    /// Per-model connectivity self-test (spec §4.4): send a trivial prompt
    /// to each configured model independently and report ok/fail.
    pub async fn test_connectivity(&self) -> HashMap<String, bool> {
        let mut out = HashMap::new();
        let probe = vec![ChatMessage::user("Respond with a JSON object: {\"ok\": true}")];
        for model in self.chain.models() {
            let single_model_chain = ModelFallbackChain::new(self.chain.client(), vec![model.clone()], 1);
            let ok = single_model_chain.complete_json(&probe, 0.0, 16).await.is_ok();
            out.insert(model.clone(), ok);
        }
        out
    }
}

/// Canonical JSON-ish key for the per-pair cache (spec §4.4: "MD5-stable
/// keys (canonical JSON serialization)").
fn cache_key(old: &HashMap<String, Value>, new: &HashMap<String, Value>) -> String {
    let canonical_old: BTreeMap<&String, &Value> = old.iter().collect();
    let canonical_new: BTreeMap<&String, &Value> = new.iter().collect();
    let combined = serde_json::json!({"old": canonical_old, "new": canonical_new});
    let serialized = serde_json::to_string(&combined).unwrap_or_default();

    let mut hasher = Md5::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_comparison_prompt(chunk: &[(usize, &HashMap<String, Value>, &HashMap<String, Value>)]) -> String {
    let mut out = String::new();
    for (index, old, new) in chunk {
        out.push_str(&format!(
            "Pair {index}:\nold: {}\nnew: {}\n\n",
            serde_json::to_string(old).unwrap_or_default(),
            serde_json::to_string(new).unwrap_or_default(),
        ));
    }
    out
}

fn parse_comparison_response(
    value: &Value,
    chunk: &[(usize, &HashMap<String, Value>, &HashMap<String, Value>)],
) -> Option<Vec<StateComparison>> {
    let array = value.as_array()?;
    let mut by_index: HashMap<i64, StateComparison> = HashMap::new();
    for item in array {
        let index = item.get("index")?.as_i64()?;
        let has_changes = item.get("has_changes")?.as_bool()?;
        let changed_fields = item
            .get("changed_fields")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect();
        let reason = item.get("reason").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        by_index.insert(index, StateComparison { has_changes, changed_fields, reason });
    }

    let mut out = Vec::with_capacity(chunk.len());
    for (index, old, new) in chunk {
        match by_index.remove(&(*index as i64)) {
            Some(comparison) => out.push(comparison),
            None => out.push(deterministic_diff(old, new)),
        }
    }
    Some(out)
}

/// Deterministic field-wise diff used whenever the whole model chain fails
/// or a single pair is missing from a partially-valid response (spec
/// §4.4): added/removed/changed keys become `changed_fields`.
pub fn deterministic_diff(old: &HashMap<String, Value>, new: &HashMap<String, Value>) -> StateComparison {
    let mut changed_fields = Vec::new();
    for key in new.keys() {
        if !old.contains_key(key) {
            changed_fields.push(key.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            changed_fields.push(key.clone());
        }
    }
    for (key, new_value) in new {
        if let Some(old_value) = old.get(key) {
            if old_value != new_value {
                changed_fields.push(key.clone());
            }
        }
    }
    changed_fields.sort();
    changed_fields.dedup();

    let reason = if changed_fields.is_empty() {
        String::new()
    } else if changed_fields.len() == 1 {
        let field = &changed_fields[0];
        match (old.get(field), new.get(field)) {
            (Some(o), Some(n)) => format!("{field} changed from {o} to {n}"),
            (None, Some(n)) => format!("{field} added: {n}"),
            (Some(o), None) => format!("{field} removed (was {o})"),
            (None, None) => format!("{field} changed"),
        }
    } else {
        format!("Multiple fields changed: {}", changed_fields.join(", "))
    };

    StateComparison { has_changes: !changed_fields.is_empty(), changed_fields, reason }
}
