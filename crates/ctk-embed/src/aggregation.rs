//! Combines per-chunk embeddings into a single conversation-level vector.

use crate::config::Aggregation;

/// `(vector, weight)` pairs produced by embedding each
/// [`crate::chunking::WeightedChunk`].
pub fn aggregate(pairs: &[(Vec<f32>, f64)], aggregation: Aggregation, dimensions: usize) -> Vec<f32> {
    if pairs.is_empty() {
        return vec![0.0; dimensions];
    }

    match aggregation {
        Aggregation::Mean => mean(pairs, dimensions),
        Aggregation::WeightedMean => {
            let weight_sum: f64 = pairs.iter().map(|(_, w)| w).sum();
            if weight_sum <= 0.0 {
                // Fall back to Mean when weights don't sum positive.
                mean(pairs, dimensions)
            } else {
                weighted_mean(pairs, weight_sum, dimensions)
            }
        }
        Aggregation::First => pairs.first().map(|(v, _)| v.clone()).unwrap_or_else(|| vec![0.0; dimensions]),
        Aggregation::Last => pairs.last().map(|(v, _)| v.clone()).unwrap_or_else(|| vec![0.0; dimensions]),
        Aggregation::Max => component_max(pairs, dimensions),
    }
}

fn mean(pairs: &[(Vec<f32>, f64)], dimensions: usize) -> Vec<f32> {
    let mut out = vec![0.0f64; dimensions];
    for (v, _) in pairs {
        for (i, x) in v.iter().enumerate().take(dimensions) {
            out[i] += *x as f64;
        }
    }
    let n = pairs.len() as f64;
    out.into_iter().map(|x| (x / n) as f32).collect()
}

fn weighted_mean(pairs: &[(Vec<f32>, f64)], weight_sum: f64, dimensions: usize) -> Vec<f32> {
    let mut out = vec![0.0f64; dimensions];
    for (v, w) in pairs {
        for (i, x) in v.iter().enumerate().take(dimensions) {
            out[i] += *x as f64 * w;
        }
    }
    out.into_iter().map(|x| (x / weight_sum) as f32).collect()
}

fn component_max(pairs: &[(Vec<f32>, f64)], dimensions: usize) -> Vec<f32> {
    let mut out = vec![f32::NEG_INFINITY; dimensions];
    for (v, _) in pairs {
        for (i, x) in v.iter().enumerate().take(dimensions) {
            if *x > out[i] {
                out[i] = *x;
            }
        }
    }
    out.into_iter().map(|x| if x.is_finite() { x } else { 0.0 }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_averages_each_component() {
        let pairs = vec![(vec![1.0, 2.0], 1.0), (vec![3.0, 4.0], 1.0)];
        let result = aggregate(&pairs, Aggregation::Mean, 2);
        assert_eq!(result, vec![2.0, 3.0]);
    }

    #[test]
    fn weighted_mean_favors_heavier_chunks() {
        let pairs = vec![(vec![0.0], 1.0), (vec![10.0], 3.0)];
        let result = aggregate(&pairs, Aggregation::WeightedMean, 1);
        assert!((result[0] - 7.5).abs() < 1e-6);
    }

    #[test]
    fn weighted_mean_falls_back_to_mean_when_weights_non_positive() {
        let pairs = vec![(vec![2.0], 0.0), (vec![4.0], 0.0)];
        let result = aggregate(&pairs, Aggregation::WeightedMean, 1);
        assert_eq!(result, vec![3.0]);
    }

    #[test]
    fn max_takes_component_wise_maximum() {
        let pairs = vec![(vec![1.0, 5.0], 1.0), (vec![3.0, 2.0], 1.0)];
        let result = aggregate(&pairs, Aggregation::Max, 2);
        assert_eq!(result, vec![3.0, 5.0]);
    }

    #[test]
    fn empty_chunk_set_is_zero_vector() {
        let result = aggregate(&[], Aggregation::Mean, 4);
        assert_eq!(result, vec![0.0; 4]);
    }
}
