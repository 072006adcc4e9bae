//! Domain model, validation layer, and pagination carrier for the
//! conversation toolkit.
//!
//! This crate has no persistence or provider dependencies so it can be
//! shared by `ctk-store`, `ctk-embed`, `ctk-similarity`, and any future
//! MCP/CLI collaborator without pulling in SQLite or network clients.

pub mod constants;
pub mod content;
pub mod conversation;
pub mod message;
pub mod pagination;
pub mod validation;

pub use content::{ContentFragment, ContentType, MediaContent, MessageContent, ToolCall, ToolCallStatus};
pub use conversation::{ConversationMetadata, ConversationSummary, ConversationTree};
pub use message::{Message, MessageRole};
pub use pagination::Paginated;
