//! Boundary validators for the tool-call surface. These operate on
//! loosely-typed `serde_json::Value` inputs because the MCP
//! collaborator's tool arguments arrive as JSON, not native Rust types.

use ctk_error::ValidationError;
use serde_json::Value;

/// `value` must be a string, at most `max_length` chars. `required`
/// controls whether a missing/null value is itself an error.
pub fn validate_string(
    value: Option<&Value>,
    name: &str,
    max_length: usize,
    required: bool,
) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::Required {
                    field: name.to_string(),
                })
            } else {
                Ok(None)
            }
        }
        Some(Value::String(s)) => {
            if s.chars().count() > max_length {
                Err(ValidationError::TooLong {
                    field: name.to_string(),
                    max: max_length,
                    actual: s.chars().count(),
                })
            } else {
                Ok(Some(s.clone()))
            }
        }
        Some(other) => Err(ValidationError::WrongType {
            field: name.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Accepts native booleans and the usual string/number spellings,
/// case-insensitively.
pub fn validate_boolean(value: &Value, name: &str) -> Result<bool, ValidationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i {
                    1 => Ok(true),
                    0 => Ok(false),
                    _ => Err(ValidationError::NotBoolean {
                        field: name.to_string(),
                        value: value.to_string(),
                    }),
                }
            } else {
                Err(ValidationError::NotBoolean {
                    field: name.to_string(),
                    value: value.to_string(),
                })
            }
        }
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ValidationError::NotBoolean {
                field: name.to_string(),
                value: value.to_string(),
            }),
        },
        other => Err(ValidationError::NotBoolean {
            field: name.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Rejects JSON booleans explicitly (`true`/`false` are not integers even
/// though `serde_json` can coerce `Value::Bool` via some paths).
pub fn validate_integer(
    value: &Value,
    name: &str,
    min_val: Option<i64>,
    max_val: Option<i64>,
) -> Result<i64, ValidationError> {
    if value.is_boolean() {
        return Err(ValidationError::NotInteger {
            field: name.to_string(),
            value: value.to_string(),
        });
    }
    let n = match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| ValidationError::NotInteger {
            field: name.to_string(),
            value: value.to_string(),
        })?,
        Value::String(s) => s.parse::<i64>().map_err(|_| ValidationError::NotInteger {
            field: name.to_string(),
            value: value.to_string(),
        })?,
        other => {
            return Err(ValidationError::NotInteger {
                field: name.to_string(),
                value: other.to_string(),
            })
        }
    };
    check_range(n, min_val, max_val, name)?;
    Ok(n)
}

pub fn validate_float(
    value: &Value,
    name: &str,
    min_val: Option<f64>,
    max_val: Option<f64>,
) -> Result<f64, ValidationError> {
    if value.is_boolean() {
        return Err(ValidationError::NotFloat {
            field: name.to_string(),
            value: value.to_string(),
        });
    }
    let n = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ValidationError::NotFloat {
            field: name.to_string(),
            value: value.to_string(),
        })?,
        Value::String(s) => s.parse::<f64>().map_err(|_| ValidationError::NotFloat {
            field: name.to_string(),
            value: value.to_string(),
        })?,
        other => {
            return Err(ValidationError::NotFloat {
                field: name.to_string(),
                value: other.to_string(),
            })
        }
    };
    if let Some(min) = min_val {
        if n < min {
            return Err(range_error(name, min_val, max_val, n));
        }
    }
    if let Some(max) = max_val {
        if n > max {
            return Err(range_error(name, min_val, max_val, n));
        }
    }
    Ok(n)
}

fn check_range(
    n: i64,
    min_val: Option<i64>,
    max_val: Option<i64>,
    name: &str,
) -> Result<(), ValidationError> {
    if let Some(min) = min_val {
        if n < min {
            return Err(ValidationError::OutOfRange {
                field: name.to_string(),
                min: min.to_string(),
                max: max_val.map(|m| m.to_string()).unwrap_or_default(),
                actual: n.to_string(),
            });
        }
    }
    if let Some(max) = max_val {
        if n > max {
            return Err(ValidationError::OutOfRange {
                field: name.to_string(),
                min: min_val.map(|m| m.to_string()).unwrap_or_default(),
                max: max.to_string(),
                actual: n.to_string(),
            });
        }
    }
    Ok(())
}

fn range_error(name: &str, min_val: Option<f64>, max_val: Option<f64>, actual: f64) -> ValidationError {
    ValidationError::OutOfRange {
        field: name.to_string(),
        min: min_val.map(|m| m.to_string()).unwrap_or_default(),
        max: max_val.map(|m| m.to_string()).unwrap_or_default(),
        actual: actual.to_string(),
    }
}

/// Conversation ids must be ascii `[a-zA-Z0-9_-]+`.
pub fn validate_conversation_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidIdentifier {
            field: "conversation_id".to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_too_long_rejected() {
        let long = "a".repeat(11);
        let err = validate_string(Some(&json!(long)), "title", 10, false).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { .. }));
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        assert_eq!(validate_boolean(&json!("YES"), "f").unwrap(), true);
        assert_eq!(validate_boolean(&json!("0"), "f").unwrap(), false);
        assert_eq!(validate_boolean(&json!(true), "f").unwrap(), true);
    }

    #[test]
    fn integer_rejects_booleans() {
        let err = validate_integer(&json!(true), "limit", None, None).unwrap_err();
        assert!(matches!(err, ValidationError::NotInteger { .. }));
    }

    #[test]
    fn integer_enforces_bounds() {
        let err = validate_integer(&json!(20000), "limit", Some(1), Some(10000)).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
        assert_eq!(validate_integer(&json!(5), "limit", Some(1), Some(10000)).unwrap(), 5);
    }

    #[test]
    fn conversation_id_rejects_non_ascii_punctuation() {
        assert!(validate_conversation_id("abc-123_DEF").is_ok());
        assert!(validate_conversation_id("abc/123").is_err());
        assert!(validate_conversation_id("").is_err());
    }
}
