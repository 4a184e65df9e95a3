//! Multi-strategy entity resolution (spec §4.3), ported from
//! `entity_resolver.py`: exact normalized-name match, vector similarity,
//! fuzzy string matching, and an LLM batch fallback, tried in that order
//! and falling through to the next strategy only when the current one
//! comes up empty.

pub mod cache;
pub mod fuzzy;
pub mod llm_match;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meetgraph_config::ResolutionConfig;
use meetgraph_core::{normalize_name, CoreError, CoreResult, Entity, EntityMatch, EntityType, MatchKind};
use meetgraph_embeddings::EmbeddingEngine;
use meetgraph_llm::ModelFallbackChain;
use meetgraph_storage::Store;

use cache::EntityCache;

/// Snapshot of per-strategy match counts (spec §4.3: "resolver exposes hit
/// counts per strategy").
#[derive(Debug, Clone, Default)]
pub struct ResolverStats {
    pub exact_matches: u64,
    pub vector_matches: u64,
    pub fuzzy_matches: u64,
    pub llm_matches: u64,
    pub llm_no_match: u64,
    pub llm_disabled: u64,
    pub llm_error: u64,
    pub no_entities: u64,
}

#[derive(Default)]
struct StatsInner {
    exact_matches: AtomicU64,
    vector_matches: AtomicU64,
    fuzzy_matches: AtomicU64,
    llm_matches: AtomicU64,
    llm_no_match: AtomicU64,
    llm_disabled: AtomicU64,
    llm_error: AtomicU64,
    no_entities: AtomicU64,
}

pub struct EntityResolver {
    store: Arc<Store>,
    embeddings: Arc<EmbeddingEngine>,
    llm: Option<Arc<ModelFallbackChain>>,
    config: ResolutionConfig,
    cache: EntityCache,
    stats: StatsInner,
}

impl EntityResolver {
    pub fn new(
        store: Arc<Store>,
        embeddings: Arc<EmbeddingEngine>,
        llm: Option<Arc<ModelFallbackChain>>,
        config: ResolutionConfig,
    ) -> Self {
        let ttl = Duration::from_secs(config.entity_cache_ttl_s);
        Self { store, embeddings, llm, config, cache: EntityCache::new(ttl), stats: StatsInner::default() }
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            exact_matches: self.stats.exact_matches.load(Ordering::Relaxed),
            vector_matches: self.stats.vector_matches.load(Ordering::Relaxed),
            fuzzy_matches: self.stats.fuzzy_matches.load(Ordering::Relaxed),
            llm_matches: self.stats.llm_matches.load(Ordering::Relaxed),
            llm_no_match: self.stats.llm_no_match.load(Ordering::Relaxed),
            llm_disabled: self.stats.llm_disabled.load(Ordering::Relaxed),
            llm_error: self.stats.llm_error.load(Ordering::Relaxed),
            no_entities: self.stats.no_entities.load(Ordering::Relaxed),
        }
    }

    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    async fn catalog(&self) -> CoreResult<Arc<Vec<Entity>>> {
        let store = Arc::clone(&self.store);
        self.cache.get_or_load(|| store.get_all_entities(None, None, 0).map_err(CoreError::from)).await
    }

    /// Resolve every query term against the entity catalog, one
    /// [`EntityMatch`] per term in input order (spec §4.3, P4: exact
    /// matches are always confidence 1.0).
    pub async fn resolve_entities(&self, query_terms: &[String], entity_type_hint: Option<EntityType>) -> CoreResult<Vec<EntityMatch>> {
        let catalog = self.catalog().await?;
        let candidates: Vec<&Entity> = match entity_type_hint {
            Some(wanted) => catalog.iter().filter(|e| e.entity_type == wanted).collect(),
            None => catalog.iter().collect(),
        };

        if candidates.is_empty() {
            self.stats.no_entities.fetch_add(query_terms.len() as u64, Ordering::Relaxed);
            return Ok(query_terms
                .iter()
                .map(|term| no_match(term, MatchKind::NoEntities))
                .collect());
        }

        let mut results: Vec<Option<EntityMatch>> = vec![None; query_terms.len()];
        let mut unresolved_indices = Vec::new();

        for (idx, term) in query_terms.iter().enumerate() {
            if let Some(m) = self.try_exact_match(term, &candidates) {
                self.stats.exact_matches.fetch_add(1, Ordering::Relaxed);
                results[idx] = Some(m);
                continue;
            }
            if let Some(m) = self.try_vector_match(term, entity_type_hint).await? {
                self.stats.vector_matches.fetch_add(1, Ordering::Relaxed);
                results[idx] = Some(m);
                continue;
            }
            if let Some(m) = self.try_fuzzy_match(term, &candidates) {
                self.stats.fuzzy_matches.fetch_add(1, Ordering::Relaxed);
                results[idx] = Some(m);
                continue;
            }
            unresolved_indices.push(idx);
        }

        if !unresolved_indices.is_empty() {
            self.resolve_remaining_with_llm(query_terms, &unresolved_indices, &candidates, &mut results).await;
        }

        Ok(results.into_iter().map(|r| r.expect("every query term assigned a match")).collect())
    }

    fn try_exact_match(&self, term: &str, candidates: &[&Entity]) -> Option<EntityMatch> {
        let normalized = normalize_name(term);
        candidates.iter().find(|e| e.normalized_name == normalized).map(|e| EntityMatch {
            query_term: term.to_string(),
            entity: Some((*e).clone()),
            confidence: 1.0,
            match_type: MatchKind::Exact,
            metadata: Default::default(),
        })
    }

    async fn try_vector_match(&self, term: &str, entity_type_hint: Option<EntityType>) -> CoreResult<Option<EntityMatch>> {
        let query_vector = self.embeddings.encode(term);
        // threshold has an absolute floor so a misconfigured value near
        // zero can't turn vector matching into "match anything" (spec §4.3).
        let threshold = self.config.vector_threshold.max(0.50);

        let hits = self.store.search_entity_embeddings(&query_vector, 5).map_err(CoreError::from)?;
        for (entity_id, score) in hits {
            if score < threshold {
                // hits are sorted descending; nothing further will clear the bar.
                break;
            }
            let Some(entity) = self.store.get_entity(entity_id).map_err(CoreError::from)? else {
                continue;
            };
            if let Some(hint) = entity_type_hint {
                if entity.entity_type != hint {
                    continue;
                }
            }
            return Ok(Some(EntityMatch {
                query_term: term.to_string(),
                entity: Some(entity),
                confidence: score,
                match_type: MatchKind::Vector,
                metadata: Default::default(),
            }));
        }
        Ok(None)
    }

    fn try_fuzzy_match(&self, term: &str, candidates: &[&Entity]) -> Option<EntityMatch> {
        let normalized_term = normalize_name(term);
        let threshold = self.config.fuzzy_threshold.max(0.50);

        let mut best: Option<(f32, &Entity)> = None;
        for entity in candidates {
            let score = fuzzy::ensemble_score(&normalized_term, &entity.normalized_name);
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, entity));
            }
        }

        best.filter(|(score, _)| *score >= threshold).map(|(score, entity)| EntityMatch {
            query_term: term.to_string(),
            entity: Some(entity.clone()),
            confidence: score,
            match_type: MatchKind::Fuzzy,
            metadata: Default::default(),
        })
    }

    async fn resolve_remaining_with_llm(
        &self,
        query_terms: &[String],
        unresolved_indices: &[usize],
        candidates: &[&Entity],
        results: &mut [Option<EntityMatch>],
    ) {
        let Some(chain) = self.llm.clone().filter(|_| self.config.use_llm) else {
            self.stats.llm_disabled.fetch_add(unresolved_indices.len() as u64, Ordering::Relaxed);
            for &idx in unresolved_indices {
                results[idx] = Some(no_match(&query_terms[idx], MatchKind::LlmDisabled));
            }
            return;
        };

        let terms: Vec<String> = unresolved_indices.iter().map(|&idx| query_terms[idx].clone()).collect();
        let owned_catalog: Vec<Entity> = candidates.iter().map(|e| (*e).clone()).collect();

        match llm_match::resolve_via_llm(&chain, &terms, &owned_catalog).await {
            Ok(outcomes) => {
                for &idx in unresolved_indices {
                    let term = &query_terms[idx];
                    let matched = outcomes.get(term).and_then(|outcome| {
                        outcome.entity_id.map(|id| (outcome.confidence, id))
                    });
                    match matched {
                        Some((confidence, entity_id)) => {
                            self.stats.llm_matches.fetch_add(1, Ordering::Relaxed);
                            let entity = owned_catalog.iter().find(|e| e.id == entity_id).cloned();
                            results[idx] = Some(EntityMatch {
                                query_term: term.clone(),
                                entity,
                                confidence,
                                match_type: MatchKind::Llm,
                                metadata: Default::default(),
                            });
                        }
                        None => {
                            self.stats.llm_no_match.fetch_add(1, Ordering::Relaxed);
                            results[idx] = Some(no_match(term, MatchKind::LlmNoMatch));
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "llm entity resolution failed for batch");
                self.stats.llm_error.fetch_add(unresolved_indices.len() as u64, Ordering::Relaxed);
                for &idx in unresolved_indices {
                    results[idx] = Some(no_match(&query_terms[idx], MatchKind::LlmError));
                }
            }
        }
    }
}

fn no_match(term: &str, match_type: MatchKind) -> EntityMatch {
    EntityMatch { query_term: term.to_string(), entity: None, confidence: 0.0, match_type, metadata: Default::default() }
}
