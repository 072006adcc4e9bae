//! Orchestrates chunking, batched embedding (with retry), and aggregation
//! into a single per-conversation vector: chunk into groups of
//! `max_batch_size`, retry up to `max_retries` with a fixed delay between
//! attempts. The core stays synchronous, so retries sleep the calling
//! thread rather than `tokio::time::sleep`.

use std::thread::sleep;
use std::time::Duration;

use ctk_core::constants::DEFAULT_EMBED_BATCH_SIZE;
use ctk_core::conversation::ConversationTree;
use ctk_error::{CtkError, CtkResult};
use tracing::{debug, info, warn};

use crate::aggregation::aggregate;
use crate::chunking::extract_chunks;
use crate::config::ConversationEmbeddingConfig;
use crate::provider::{provider_for_name, Embedding, EmbeddingProvider};

/// Batching/retry tunables.
#[derive(Debug, Clone, Copy)]
pub struct BatchEmbeddingConfig {
    pub max_batch_size: usize,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl Default for BatchEmbeddingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            max_retries: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

pub struct EmbeddingManager {
    provider: Box<dyn EmbeddingProvider>,
    batch_config: BatchEmbeddingConfig,
}

impl EmbeddingManager {
    /// Constructs a manager from a provider name. Unknown names fail
    /// loudly here rather than at first use.
    pub fn new(provider_name: &str) -> CtkResult<Self> {
        Ok(Self {
            provider: provider_for_name(provider_name)?,
            batch_config: BatchEmbeddingConfig::default(),
        })
    }

    pub fn with_provider(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_config: BatchEmbeddingConfig::default(),
        }
    }

    pub fn with_batch_config(mut self, batch_config: BatchEmbeddingConfig) -> Self {
        self.batch_config = batch_config;
        self
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Chunks `tree` per `config`, embeds every chunk (batched), and
    /// aggregates into a single vector. An empty chunk set (e.g. an empty
    /// conversation) yields a zero vector of the provider's dimensionality
    /// without calling the provider at all.
    pub fn embed_conversation(&self, tree: &ConversationTree, config: &ConversationEmbeddingConfig) -> CtkResult<Vec<f32>> {
        let chunks = extract_chunks(tree, config);
        if chunks.is_empty() {
            debug!(conversation_id = %tree.id, "no chunks to embed, returning zero vector");
            return Ok(vec![0.0; self.provider.get_dimensions()]);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.batch_embed_texts(&texts)?;

        let pairs: Vec<(Vec<f32>, f64)> = embeddings
            .into_iter()
            .zip(chunks.iter())
            .map(|(e, c)| (e.vector, c.weight))
            .collect();

        Ok(aggregate(&pairs, config.aggregation, self.provider.get_dimensions()))
    }

    /// Batch-embeds `texts` in groups of `max_batch_size`, retrying each
    /// failed batch up to `max_retries` times before giving up.
    pub fn batch_embed_texts(&self, texts: &[String]) -> CtkResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        info!(total = texts.len(), batch_size = self.batch_config.max_batch_size, "batch embedding texts");

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (batch_idx, batch) in texts.chunks(self.batch_config.max_batch_size).enumerate() {
            let mut retry_count = 0;
            let embeddings = loop {
                match self.provider.embed_batch(batch) {
                    Ok(embeddings) => break embeddings,
                    Err(e) if retry_count < self.batch_config.max_retries => {
                        retry_count += 1;
                        warn!(
                            batch = batch_idx,
                            attempt = retry_count,
                            max_retries = self.batch_config.max_retries,
                            error = %e,
                            "batch embedding failed, retrying"
                        );
                        sleep(self.batch_config.retry_delay);
                    }
                    Err(e) => {
                        return Err(CtkError::provider(format!(
                            "batch embedding failed after {retry_count} retries: {e}"
                        )));
                    }
                }
            };
            all_embeddings.extend(embeddings);
        }
        Ok(all_embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::content::MessageContent;
    use ctk_core::message::{Message, MessageRole};

    #[test]
    fn embedding_an_empty_conversation_is_a_zero_vector() {
        let manager = EmbeddingManager::new("local").unwrap();
        let tree = ConversationTree::new(None);
        let config = ConversationEmbeddingConfig {
            include_title: false,
            include_tags: false,
            ..Default::default()
        };
        let vector = manager.embed_conversation(&tree, &config).unwrap();
        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn embedding_a_populated_conversation_is_non_zero() {
        let manager = EmbeddingManager::new("local").unwrap();
        let mut tree = ConversationTree::new(Some("rust questions".into()));
        tree.add_message(Message::new(MessageRole::User, MessageContent::from_text("how do I write rust")));
        let config = ConversationEmbeddingConfig::default();
        let vector = manager.embed_conversation(&tree, &config).unwrap();
        assert!(vector.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn batching_splits_across_groups() {
        let manager = EmbeddingManager::new("local").unwrap().with_batch_config(BatchEmbeddingConfig {
            max_batch_size: 2,
            ..Default::default()
        });
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let embeddings = manager.batch_embed_texts(&texts).unwrap();
        assert_eq!(embeddings.len(), 5);
    }
}
