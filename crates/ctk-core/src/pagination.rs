//! Paginated result carrier.

use base64::Engine;
use ctk_error::ValidationError;
use serde::{Deserialize, Serialize};

/// `items` plus an opaque `next_cursor` and a `has_more` flag. Cursor
/// encoding is internal: callers pass it back verbatim, never parse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// The ordering key + tiebreaker encoded into an opaque cursor: the
/// ordering key of the last item plus a monotonic tiebreaker. `sort_key`
/// is a stringified ordering value (e.g. an RFC3339 `updated_at`); `id`
/// is the id ascending tiebreaker that makes pagination stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub sort_key: String,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("Cursor always serializes");
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(field: &str, encoded: &str) -> Result<Self, ValidationError> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| ValidationError::InvalidCursor {
                field: field.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|_| ValidationError::InvalidCursor {
            field: field.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let c = Cursor {
            sort_key: "2024-01-01T00:00:00Z".to_string(),
            id: "abc123".to_string(),
        };
        let encoded = c.encode();
        let decoded = Cursor::decode("cursor", &encoded).unwrap();
        assert_eq!(c, decoded);
    }

    #[test]
    fn invalid_cursor_is_validation_error() {
        let err = Cursor::decode("cursor", "not-base64!!").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCursor { .. }));
    }
}
