//! A deterministic text embedding engine with the same public contract as
//! the original ONNX/sentence-transformer pipeline (`encode`, `encode_batch`,
//! `similarity`, `batch_similarity`) but backed by feature hashing instead
//! of a downloaded model file, so the workspace has no runtime dependency
//! on model weights.
//!
//! Hashing a fixed token vocabulary into a 384-dimensional vector loses the
//! semantic richness of a trained encoder, but preserves what the resolver
//! and query engine actually need from it: near-duplicate strings land close
//! together, unrelated strings don't, and the vector is stable across runs.

const DEFAULT_DIM: usize = 384;
const DEFAULT_MAX_LENGTH: usize = 256;

/// Deterministic token-hashing embedding engine.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    dim: usize,
    max_length: usize,
}

impl Default for EmbeddingEngine {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl EmbeddingEngine {
    pub fn new(dim: usize, max_length: usize) -> Self {
        Self { dim, max_length }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Encode a single string into a normalized `dim`-length vector. Never
    /// fails: an empty or whitespace-only input produces a zero vector,
    /// mirroring the original's zero-vector fallback on encoder errors.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text, self.max_length);
        if tokens.is_empty() {
            return vec![0.0; self.dim];
        }

        let mut accum = vec![0.0f32; self.dim];
        for token in &tokens {
            let bucket = hash_token(token) % self.dim as u64;
            // A second, independent hash decides the sign so that unrelated
            // tokens partially cancel instead of just accumulating in one
            // direction (the hashing-trick convention from feature hashing
            // for text classification).
            let sign = if hash_token(&format!("{token}#sign")) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            accum[bucket as usize] += sign;
        }

        normalize(&mut accum);
        accum
    }

    /// Encode many strings, preserving order.
    pub fn encode_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Cosine similarity between two already-encoded vectors (both assumed
    /// normalized by `encode`, but re-normalized defensively here so callers
    /// can pass arbitrary vectors of the right dimension).
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        normalize(&mut a);
        normalize(&mut b);
        dot(&a, &b)
    }

    /// Cosine similarity of `query` against every row of `corpus`, in order.
    pub fn batch_similarity(&self, query: &[f32], corpus: &[Vec<f32>]) -> Vec<f32> {
        let mut q = query.to_vec();
        normalize(&mut q);
        corpus
            .iter()
            .map(|row| {
                let mut r = row.clone();
                normalize(&mut r);
                dot(&q, &r)
            })
            .collect()
    }
}

fn tokenize(text: &str, max_length: usize) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .take(max_length)
        .map(|s| s.to_string())
        .collect()
}

fn hash_token(token: &str) -> u64 {
    // FNV-1a: stable across runs and platforms, unlike `DefaultHasher`
    // (which is randomly seeded per-process and would make embeddings
    // non-reproducible between runs).
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-9 {
        return;
    }
    for x in vec.iter_mut() {
        *x /= norm;
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_zero_vector() {
        let engine = EmbeddingEngine::default();
        let v = engine.encode("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn identical_text_is_self_similar() {
        let engine = EmbeddingEngine::default();
        let v = engine.encode("the migration is blocked on api review");
        let sim = engine.similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-4, "expected ~1.0, got {sim}");
    }

    #[test]
    fn encoding_is_deterministic() {
        let engine = EmbeddingEngine::default();
        let a = engine.encode("Dana owns the onboarding project");
        let b = engine.encode("Dana owns the onboarding project");
        assert_eq!(a, b);
    }

    #[test]
    fn unrelated_strings_are_less_similar_than_identical() {
        let engine = EmbeddingEngine::default();
        let a = engine.encode("the api migration is blocked");
        let b = engine.encode("quarterly budget review for finance team");
        let self_sim = engine.similarity(&a, &a);
        let cross_sim = engine.similarity(&a, &b);
        assert!(cross_sim < self_sim);
    }

    #[test]
    fn batch_similarity_matches_pairwise() {
        let engine = EmbeddingEngine::default();
        let query = engine.encode("release blocked on qa");
        let corpus = engine.encode_batch(&[
            "release blocked on qa".to_string(),
            "unrelated topic about lunch".to_string(),
        ]);
        let scores = engine.batch_similarity(&query, &corpus);
        assert!(scores[0] > scores[1]);
    }
}
