//! Pairwise similarity: metric application over embedding vectors, a
//! vectorized pairwise matrix, and a cache-through `find_similar` that
//! prefers the store's precomputed `similarities` table before falling
//! back to computing from cached embeddings.

use std::collections::HashMap;

use chrono::Utc;
use ctk_error::CtkResult;
use ctk_store::embeddings::SimilarityRecord;
use ctk_store::Store;
use rayon::prelude::*;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::metrics::SimilarityMetric;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub a_id: Uuid,
    pub b_id: Uuid,
    pub similarity: f64,
    pub method: String,
    pub metadata: Value,
}

impl SimilarityResult {
    pub fn new(a_id: Uuid, b_id: Uuid, similarity: f64, metric: SimilarityMetric) -> Self {
        Self {
            a_id,
            b_id,
            similarity,
            method: metric.as_str().to_string(),
            metadata: json!({}),
        }
    }

    fn cached(a_id: Uuid, b_id: Uuid, similarity: f64, metric: SimilarityMetric) -> Self {
        Self {
            a_id,
            b_id,
            similarity,
            method: metric.as_str().to_string(),
            metadata: json!({ "cached": true }),
        }
    }
}

/// Direct metric application over two embedding vectors. Callers working
/// from full conversations embed them first (`ctk-embed`); callers
/// working from ids load vectors via [`Store::load_embedding`] or
/// [`compute_similarity_from_store`].
pub fn compute_similarity(
    a_id: Uuid,
    a_vector: &[f32],
    b_id: Uuid,
    b_vector: &[f32],
    metric: SimilarityMetric,
) -> SimilarityResult {
    SimilarityResult::new(a_id, b_id, metric.compute(a_vector, b_vector), metric)
}

/// Loads both conversations' embeddings for the given embedding config
/// coordinates and compares them. Returns `None` if either side has no
/// stored embedding — computing a similarity against a missing vector
/// is not a runtime error, just "nothing to compare yet".
#[allow(clippy::too_many_arguments)]
pub fn compute_similarity_from_store(
    store: &Store,
    a_id: Uuid,
    b_id: Uuid,
    provider: &str,
    model: Option<&str>,
    chunking: &str,
    aggregation: &str,
    metric: SimilarityMetric,
) -> CtkResult<Option<SimilarityResult>> {
    let a = store.load_embedding(a_id, provider, model, chunking, aggregation)?;
    let b = store.load_embedding(b_id, provider, model, chunking, aggregation)?;
    Ok(match (a, b) {
        (Some(a), Some(b)) => Some(compute_similarity(a_id, &a.vector, b_id, &b.vector, metric)),
        _ => None,
    })
}

/// n×n similarity matrix: diagonal 1.0, symmetric, row/column order
/// matches `items`. Uses `rayon` to parallelize across rows for
/// vectorized pairwise computation.
pub fn compute_similarity_matrix(items: &[(Uuid, Vec<f32>)], metric: SimilarityMetric) -> Vec<Vec<f64>> {
    let n = items.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        1.0
                    } else {
                        metric.compute(&items[i].1, &items[j].1)
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect()
}

/// Top-`k` most similar conversations to `target_id`, excluding itself.
///
/// Cache path: when `use_cache`, first tries
/// `store.get_similar_conversations` (the precomputed `similarities`
/// table). On a miss, falls back to computing against `candidates`
/// (or every embedding under `config_hash` if `candidates` is `None`),
/// writing each freshly computed pair back to the store so the next
/// lookup hits the cache.
#[allow(clippy::too_many_arguments)]
pub fn find_similar(
    store: &Store,
    target_id: Uuid,
    target_vector: &[f32],
    config_hash: &str,
    provider: &str,
    candidates: Option<Vec<(Uuid, Vec<f32>)>>,
    metric: SimilarityMetric,
    top_k: usize,
    threshold: f64,
    use_cache: bool,
) -> CtkResult<Vec<SimilarityResult>> {
    if use_cache {
        let cached = store.get_similar_conversations(target_id, metric.as_str(), top_k, threshold)?;
        if !cached.is_empty() {
            debug!(target = %target_id, hits = cached.len(), "find_similar cache hit");
            return Ok(cached
                .into_iter()
                .map(|(id, sim)| SimilarityResult::cached(target_id, id, sim, metric))
                .collect());
        }
    }

    let candidates = match candidates {
        Some(c) => c,
        None => store.list_embeddings_by_config_hash(config_hash)?,
    };

    let mut scored: Vec<SimilarityResult> = candidates
        .iter()
        .filter(|(id, _)| *id != target_id)
        .map(|(id, vector)| compute_similarity(target_id, target_vector, *id, vector, metric))
        .filter(|r| r.similarity >= threshold)
        .collect();

    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    for result in &scored {
        store.save_similarity(&SimilarityRecord {
            a_id: result.a_id,
            b_id: result.b_id,
            metric: metric.as_str().to_string(),
            provider: provider.to_string(),
            similarity: result.similarity,
            computed_at: Utc::now(),
        })?;
    }

    Ok(scored)
}

/// Groups a flat similarity-matrix result back into a lookup keyed by id
/// pair, used by the graph builder to avoid recomputing similarities it
/// already has from `compute_similarity_matrix`.
pub fn matrix_to_pairs(items: &[(Uuid, Vec<f32>)], matrix: &[Vec<f64>]) -> HashMap<(Uuid, Uuid), f64> {
    let mut pairs = HashMap::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            pairs.insert((items[i].0, items[j].0), matrix[i][j]);
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_diagonal_is_one_and_symmetric() {
        let items = vec![
            (Uuid::new_v4(), vec![1.0, 0.0]),
            (Uuid::new_v4(), vec![0.0, 1.0]),
        ];
        let matrix = compute_similarity_matrix(&items, SimilarityMetric::Cosine);
        assert_eq!(matrix[0][0], 1.0);
        assert_eq!(matrix[1][1], 1.0);
        assert_eq!(matrix[0][1], matrix[1][0]);
    }

    #[test]
    fn find_similar_excludes_self_and_respects_threshold() {
        let store = Store::open_in_memory().unwrap();
        let target = Uuid::new_v4();
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        let candidates = vec![
            (target, vec![1.0, 0.0]),
            (close, vec![0.9, 0.1]),
            (far, vec![-1.0, 0.0]),
        ];
        let results = find_similar(
            &store,
            target,
            &[1.0, 0.0],
            "hash",
            "local",
            Some(candidates),
            SimilarityMetric::Cosine,
            10,
            0.5,
            false,
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].b_id, close);
    }

    #[test]
    fn find_similar_writes_through_to_cache() {
        let store = Store::open_in_memory().unwrap();
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();
        let candidates = vec![(target, vec![1.0, 0.0]), (other, vec![1.0, 0.0])];
        find_similar(
            &store,
            target,
            &[1.0, 0.0],
            "hash",
            "local",
            Some(candidates),
            SimilarityMetric::Cosine,
            10,
            0.0,
            false,
        )
        .unwrap();

        let cached = store.get_similar_conversations(target, "cosine", 10, 0.0).unwrap();
        assert_eq!(cached, vec![(other, 1.0)]);
    }
}
