//! `ConversationEmbeddingConfig` and its cache-key hash.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Traversal order used to turn a conversation into chunks of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chunking {
    /// One chunk: the entire longest-path text, concatenated.
    Whole,
    /// One chunk per message, longest-path order.
    Message,
    /// User+assistant pairs; an orphaned message (no adjacent partner) is
    /// emitted alone.
    MessagePair,
    /// A sliding window of `window_size` messages (from `provider_config`,
    /// default [`ctk_core::constants::DEFAULT_WINDOW_SIZE`]).
    Window,
}

impl Chunking {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chunking::Whole => "whole",
            Chunking::Message => "message",
            Chunking::MessagePair => "message_pair",
            Chunking::Window => "window",
        }
    }
}

/// How chunk embeddings combine into a single conversation-level vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    WeightedMean,
    First,
    Last,
    Max,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::WeightedMean => "weighted_mean",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Max => "max",
        }
    }
}

/// Keyed entirely by strings (role names, provider option names) rather
/// than `ctk_core::message::MessageRole` so arbitrary/future role labels
/// can carry a weight without a matching enum variant, and so `BTreeMap`
/// gives a stable iteration order for [`ConversationEmbeddingConfig::to_hash`]
/// (a plain `HashMap` would serialize its entries in an unspecified order
/// and break hash stability across runs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEmbeddingConfig {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    pub chunking: Chunking,
    pub aggregation: Aggregation,
    #[serde(default = "default_role_weights")]
    pub role_weights: BTreeMap<String, f64>,
    #[serde(default = "default_true")]
    pub include_title: bool,
    #[serde(default = "default_true")]
    pub include_tags: bool,
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    #[serde(default)]
    pub provider_config: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_title_weight() -> f64 {
    1.5
}

/// `{user: 2.0, assistant: 1.0, system: 0.5, tool: 0.5}`.
/// Roles not present here (or not recognized at all) weight 1.0 — see
/// [`ConversationEmbeddingConfig::role_weight`].
pub fn default_role_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("user".to_string(), 2.0),
        ("assistant".to_string(), 1.0),
        ("system".to_string(), 0.5),
        ("tool".to_string(), 0.5),
    ])
}

impl Default for ConversationEmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: None,
            chunking: Chunking::Whole,
            aggregation: Aggregation::Mean,
            role_weights: default_role_weights(),
            include_title: true,
            include_tags: true,
            title_weight: default_title_weight(),
            provider_config: BTreeMap::new(),
        }
    }
}

impl ConversationEmbeddingConfig {
    /// Weight for a role name, defaulting to 1.0 for anything not present
    /// in `role_weights`.
    pub fn role_weight(&self, role: &str) -> f64 {
        self.role_weights.get(role).copied().unwrap_or(1.0)
    }

    pub fn window_size(&self) -> usize {
        self.provider_config
            .get("window_size")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(ctk_core::constants::DEFAULT_WINDOW_SIZE)
    }

    /// Stable 16-hex-digit cache key: SHA-256 over the canonical
    /// (field-ordered, `BTreeMap`-ordered) `serde_json` encoding of `self`,
    /// truncated.
    pub fn to_hash(&self) -> String {
        // `serde_json` cannot fail on a config built entirely from owned
        // strings/numbers/maps; `unwrap_or_default` only guards the
        // theoretical case and never actually triggers here.
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        format!("{:x}", digest)[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_equal_configs() {
        let a = ConversationEmbeddingConfig::default();
        let b = ConversationEmbeddingConfig::default();
        assert_eq!(a.to_hash(), b.to_hash());
        assert_eq!(a.to_hash().len(), 16);
    }

    #[test]
    fn hash_changes_when_chunking_changes() {
        let a = ConversationEmbeddingConfig::default();
        let mut b = a.clone();
        b.chunking = Chunking::Window;
        assert_ne!(a.to_hash(), b.to_hash());
    }

    #[test]
    fn chunking_and_aggregation_as_str_match_serde_tags() {
        assert_eq!(Chunking::MessagePair.as_str(), "message_pair");
        assert_eq!(Aggregation::WeightedMean.as_str(), "weighted_mean");
    }

    #[test]
    fn unknown_role_weight_defaults_to_one() {
        let cfg = ConversationEmbeddingConfig::default();
        assert_eq!(cfg.role_weight("tool_result"), 1.0);
        assert_eq!(cfg.role_weight("user"), 2.0);
    }
}
