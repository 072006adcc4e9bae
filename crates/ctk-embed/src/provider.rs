//! `EmbeddingProvider` trait and the deterministic, offline
//! `TfIdfProvider`, always available as a local fallback without
//! network access.

use std::collections::HashMap;
use std::sync::RwLock;

use ctk_error::{CtkError, CtkResult};
use regex::Regex;
use std::sync::OnceLock;

/// Result of embedding a single piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// Contract every embedding backend implements. Unknown provider names
/// fail loudly at construction — see
/// [`crate::manager::EmbeddingManager::new`].
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;
    fn embed(&self, text: &str) -> CtkResult<Embedding>;
    fn embed_batch(&self, texts: &[String]) -> CtkResult<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
    fn get_dimensions(&self) -> usize;
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_]+").expect("static pattern"))
}

fn tokenize(text: &str) -> Vec<String> {
    word_pattern()
        .find_iter(&text.to_ascii_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A hashing-vectorizer TF-IDF provider: tokens hash into a fixed-size
/// vector (no vocabulary growth), weighted by a log-scaled inverse
/// document frequency fit from a corpus via [`TfIdfProvider::fit`]. Pure
/// Rust, no network — the offline default, additionally supporting
/// `fit(corpus)`.
pub struct TfIdfProvider {
    dimensions: usize,
    idf: RwLock<HashMap<String, f64>>,
    doc_count: RwLock<usize>,
}

impl TfIdfProvider {
    pub const DEFAULT_DIMENSIONS: usize = 256;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            idf: RwLock::new(HashMap::new()),
            doc_count: RwLock::new(0),
        }
    }

    /// Fits document frequencies from `corpus`. Callers MUST fit before
    /// `embed`/`embed_batch`; without a fit, every term's idf defaults to
    /// 1.0 (equivalent to plain term-frequency weighting).
    pub fn fit(&self, corpus: &[String]) {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let mut seen = std::collections::HashSet::new();
            for tok in tokenize(doc) {
                if seen.insert(tok.clone()) {
                    *doc_freq.entry(tok).or_insert(0) += 1;
                }
            }
        }
        let n = corpus.len().max(1) as f64;
        let mut idf = self.idf.write().expect("idf lock poisoned");
        idf.clear();
        for (term, df) in doc_freq {
            // Smoothed idf: log(N / df) + 1, never negative, never zero.
            idf.insert(term, (n / df as f64).ln() + 1.0);
        }
        *self.doc_count.write().expect("doc_count lock poisoned") = corpus.len();
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(token, &mut hasher);
        (std::hash::Hasher::finish(&hasher) as usize) % self.dimensions
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; self.dimensions];
        }
        let mut tf: HashMap<usize, f64> = HashMap::new();
        let idf = self.idf.read().expect("idf lock poisoned");
        for tok in &tokens {
            let weight = idf.get(tok).copied().unwrap_or(1.0);
            *tf.entry(self.bucket(tok)).or_insert(0.0) += weight;
        }
        let mut vector = vec![0.0f32; self.dimensions];
        let norm_factor = tokens.len() as f64;
        for (bucket, weight) in tf {
            vector[bucket] = (weight / norm_factor) as f32;
        }
        vector
    }
}

impl EmbeddingProvider for TfIdfProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn embed(&self, text: &str) -> CtkResult<Embedding> {
        Ok(Embedding {
            vector: self.vectorize(text),
            model: "tfidf-hashing".to_string(),
            dimensions: self.dimensions,
        })
    }

    fn get_dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Constructs a provider by name. Unknown names fail loudly rather than
/// silently falling back.
pub fn provider_for_name(name: &str) -> CtkResult<Box<dyn EmbeddingProvider>> {
    match name {
        "local" | "tfidf" => Ok(Box::new(TfIdfProvider::new(TfIdfProvider::DEFAULT_DIMENSIONS))),
        other => Err(CtkError::provider(format!("unknown embedding provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_without_fit_still_produces_a_vector() {
        let provider = TfIdfProvider::new(64);
        let embedding = provider.embed("hello world").unwrap();
        assert_eq!(embedding.vector.len(), 64);
        assert!(embedding.vector.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn fit_changes_term_weighting() {
        let provider = TfIdfProvider::new(64);
        let corpus = vec![
            "rust programming language".to_string(),
            "rust is fast".to_string(),
            "python is popular".to_string(),
        ];
        provider.fit(&corpus);
        let rust_embedding = provider.embed("rust").unwrap();
        assert!(rust_embedding.vector.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let provider = TfIdfProvider::new(32);
        let embedding = provider.embed("").unwrap();
        assert!(embedding.vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn unknown_provider_name_fails_at_construction() {
        let result = provider_for_name("totally-not-a-provider");
        assert!(result.is_err());
    }
}
