use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Tag for the kind of content carried by a message fragment or attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Code,
    ToolCall,
    ToolResult,
}

/// An attachment with at most three carrier forms. Predicates below are
/// not mutually exclusive by construction; importers are expected to
/// populate exactly one carrier, but a malformed import that sets two is
/// represented rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaContent {
    pub url: Option<String>,
    pub path: Option<String>,
    pub data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl MediaContent {
    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    pub fn is_local(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_embedded(&self) -> bool {
        self.data.is_some()
    }
}

/// Lifecycle state of a [`ToolCall`]. Kept as a real enum rather than a
/// free-form status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default = "default_tool_status")]
    pub status: ToolCallStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_tool_status() -> ToolCallStatus {
    ToolCallStatus::Pending
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            arguments: HashMap::new(),
            result: None,
            status: ToolCallStatus::Pending,
            error: None,
            metadata: HashMap::new(),
        }
    }
}

/// Normalized representation of duck-typed `content` fields seen across
/// import formats (sometimes a string, sometimes a list, sometimes a map
/// with `text`/`content` keys), expressed as a tagged variant instead of
/// staying duck-typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentFragment {
    Raw(String),
    Structured(HashMap<String, Value>),
    List(Vec<ContentFragment>),
}

impl ContentFragment {
    /// Best-effort text extraction, used by [`MessageContent::get_text`]'s
    /// fallback path over legacy `parts`. Structured fragments are probed
    /// for `text` then `content` keys (the two shapes seen in the
    /// original importer sources); anything else is skipped rather than
    /// erroring.
    pub fn extract_text(&self) -> Option<String> {
        match self {
            ContentFragment::Raw(s) => {
                if s.is_empty() {
                    None
                } else {
                    Some(s.clone())
                }
            }
            ContentFragment::Structured(map) => map
                .get("text")
                .or_else(|| map.get("content"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            ContentFragment::List(items) => {
                let joined: Vec<String> = items.iter().filter_map(|i| i.extract_text()).collect();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined.join(""))
                }
            }
        }
    }
}

/// Aggregate message body: a structured `text` slot, typed attachment
/// lists, tool calls, and a `parts` fallback kept for importer fidelity
/// when the source format didn't map cleanly onto the structured fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<MediaContent>,
    #[serde(default)]
    pub audio: Vec<MediaContent>,
    #[serde(default)]
    pub video: Vec<MediaContent>,
    #[serde(default)]
    pub documents: Vec<MediaContent>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub parts: Vec<ContentFragment>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl MessageContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Returns `text` if set; otherwise concatenates textual fragments
    /// extracted from `parts`; otherwise the empty string. Never fails.
    pub fn get_text(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let joined: Vec<String> = self.parts.iter().filter_map(|p| p.extract_text()).collect();
        joined.join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_text_prefers_explicit_text() {
        let mut c = MessageContent::from_text("hello");
        c.parts.push(ContentFragment::Raw("ignored".into()));
        assert_eq!(c.get_text(), "hello");
    }

    #[test]
    fn get_text_falls_back_to_parts() {
        let mut c = MessageContent::default();
        c.parts.push(ContentFragment::Raw("foo".into()));
        c.parts.push(ContentFragment::Raw("bar".into()));
        assert_eq!(c.get_text(), "foobar");
    }

    #[test]
    fn get_text_extracts_structured_fragment() {
        let mut map = HashMap::new();
        map.insert("text".to_string(), Value::String("nested".into()));
        let mut c = MessageContent::default();
        c.parts.push(ContentFragment::Structured(map));
        assert_eq!(c.get_text(), "nested");
    }

    #[test]
    fn get_text_empty_is_empty_string() {
        let c = MessageContent::default();
        assert_eq!(c.get_text(), "");
    }

    #[test]
    fn media_content_predicates_are_independent() {
        let m = MediaContent {
            url: Some("http://x".into()),
            data: Some("YWJj".into()),
            ..Default::default()
        };
        assert!(m.is_remote());
        assert!(m.is_embedded());
        assert!(!m.is_local());
    }
}
