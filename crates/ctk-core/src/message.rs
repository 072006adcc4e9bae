use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::MessageContent;

/// A message's speaker role. Construction from a free-form string
/// normalizes known aliases from the platforms the external importers
/// target (OpenAI, Anthropic, Copilot, ...); unknown strings fall back to
/// `User` rather than failing, since imports must never reject a row for
/// an unrecognized role label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Function,
    ToolResult,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::Function => "function",
            MessageRole::ToolResult => "tool_result",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "system" => MessageRole::System,
            "user" | "human" => MessageRole::User,
            "assistant" | "ai" | "claude" | "chatgpt" => MessageRole::Assistant,
            "tool" | "tool_use" => MessageRole::Tool,
            "function" | "function_call" => MessageRole::Function,
            "tool_result" => MessageRole::ToolResult,
            _ => MessageRole::User,
        }
    }
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        MessageRole::from(value.as_str())
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single node in a [`crate::conversation::ConversationTree`].
///
/// Equality is by id only, so two in-memory copies of the same logical
/// message compare equal even if content mutated underneath one of them
/// mid-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    pub timestamp: Option<DateTime<Utc>>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Message {}

impl Message {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Some(Utc::now()),
            parent_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_aliases_map_case_insensitively() {
        assert_eq!(MessageRole::from("Human"), MessageRole::User);
        assert_eq!(MessageRole::from("AI"), MessageRole::Assistant);
        assert_eq!(MessageRole::from("claude"), MessageRole::Assistant);
        assert_eq!(MessageRole::from("chatGPT"), MessageRole::Assistant);
        assert_eq!(MessageRole::from("tool_use"), MessageRole::Tool);
        assert_eq!(MessageRole::from("function_call"), MessageRole::Function);
    }

    #[test]
    fn unknown_role_falls_back_to_user() {
        assert_eq!(MessageRole::from("narrator"), MessageRole::User);
    }

    #[test]
    fn message_equality_is_by_id() {
        let mut a = Message::new(MessageRole::User, MessageContent::from_text("hi"));
        let mut b = a.clone();
        b.content = MessageContent::from_text("different");
        assert_eq!(a, b);
        a.id = Uuid::new_v4();
        assert_ne!(a, b);
    }
}
