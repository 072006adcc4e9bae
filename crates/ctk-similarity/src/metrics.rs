//! Similarity metrics. Mismatched dimensions always yield 0 rather than
//! erroring — similarity is a best-effort comparison, not a strict
//! vector-space operation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Euclidean => "euclidean",
            SimilarityMetric::DotProduct => "dot_product",
            SimilarityMetric::Manhattan => "manhattan",
        }
    }

    pub fn compute(&self, a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() {
            return 0.0;
        }
        match self {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Euclidean => euclidean(a, b),
            SimilarityMetric::DotProduct => dot(a, b),
            SimilarityMetric::Manhattan => manhattan(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum()
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| *x as f64 * *x as f64).sum::<f64>().sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    let dist: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).powi(2))
        .sum::<f64>()
        .sqrt();
    1.0 / (1.0 + dist)
}

fn manhattan(a: &[f32], b: &[f32]) -> f64 {
    let dist: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64 - *y as f64).abs()).sum();
    1.0 / (1.0 + dist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((SimilarityMetric::Cosine.compute(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(SimilarityMetric::Cosine.compute(&a, &b), 0.0);
    }

    #[test]
    fn euclidean_of_identical_vectors_is_one() {
        let v = vec![1.0, -2.0];
        assert!((SimilarityMetric::Euclidean.compute(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dot_product_can_be_negative() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_eq!(SimilarityMetric::DotProduct.compute(&a, &b), -1.0);
    }

    #[test]
    fn mismatched_dimensions_yield_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        for metric in [
            SimilarityMetric::Cosine,
            SimilarityMetric::Euclidean,
            SimilarityMetric::DotProduct,
            SimilarityMetric::Manhattan,
        ] {
            assert_eq!(metric.compute(&a, &b), 0.0);
        }
    }
}
