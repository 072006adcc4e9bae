//! Centralized reference constants. Kept as `pub const` items rather
//! than scattered magic numbers, in a single tunables module.

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(30);
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(2);
pub const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(60);
pub const MIGRATION_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SEARCH_LIMIT: usize = 1000;
pub const DEFAULT_TIMELINE_LIMIT: usize = 30;
pub const SEARCH_BUFFER: usize = 100;
pub const TITLE_MATCH_BOOST: f64 = 10.0;
pub const AMBIGUITY_CHECK_LIMIT: usize = 2;

pub const MAX_QUERY_LENGTH: usize = 10_000;
pub const MAX_TITLE_LENGTH: usize = 1_000;
pub const MAX_ID_LENGTH: usize = 200;
pub const MAX_RESULT_LIMIT: i64 = 10_000;

pub const TITLE_TRUNCATE_WIDTH: usize = 60;
pub const TITLE_TRUNCATE_WIDTH_SHORT: usize = 50;
pub const CHARS_PER_TOKEN: usize = 4;

/// Suggested recursion depth cap for path enumeration over malformed
/// (cyclic) trees.
pub const MAX_PATH_DEPTH: usize = 10_000;

/// Default sliding-window size for the `Window` chunking strategy,
/// overridable via `ConversationEmbeddingConfig::provider_config`.
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Default TF-IDF / provider batch size.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
