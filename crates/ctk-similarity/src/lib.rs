//! Similarity engine and graph builder: pairwise metrics, a cache-through
//! top-K lookup, and a threshold-filtered similarity graph with export
//! and community/bridge analysis.

pub mod graph;
pub mod metrics;
pub mod similarity;

pub use graph::{build_graph, ConversationGraph, ConversationLink};
pub use metrics::SimilarityMetric;
pub use similarity::{compute_similarity, compute_similarity_from_store, compute_similarity_matrix, find_similar, matrix_to_pairs, SimilarityResult};
