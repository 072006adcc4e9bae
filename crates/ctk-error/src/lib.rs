//! Shared error kinds for the conversation toolkit.
//!
//! A flat `thiserror` enum with `#[error("...")]` messages, `#[from]`
//! conversions for the error types we actually bubble up, and small
//! constructor helpers so call sites read as
//! `CtkError::not_found("conversation abc123")` rather than enum literals.

use thiserror::Error;

/// Boundary-only validation error. Kept separate from [`CtkError`] so
/// `ctk-core` does not need to depend on persistence or provider crates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },
    #[error("{field} must be between {min} and {max} (got {actual})")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        actual: String,
    },
    #[error("{field} must be a boolean, got {value:?}")]
    NotBoolean { field: String, value: String },
    #[error("{field} must be an integer, got {value:?}")]
    NotInteger { field: String, value: String },
    #[error("{field} must be a number, got {value:?}")]
    NotFloat { field: String, value: String },
    #[error("{field} contains characters outside [a-zA-Z0-9_-]: {value:?}")]
    InvalidIdentifier { field: String, value: String },
    #[error("{field} is not a valid pagination cursor")]
    InvalidCursor { field: String },
    #[error("{field} has the wrong type: {value:?}")]
    WrongType { field: String, value: String },
}

/// Top-level error type returned by every core operation.
#[derive(Error, Debug)]
pub enum CtkError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous identifier: {0}")]
    Ambiguous(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("migration lock timed out after {0:?}")]
    MigrationTimeout(std::time::Duration),
}

impl CtkError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::Ambiguous(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn unknown_format(msg: impl Into<String>) -> Self {
        Self::UnknownFormat(msg.into())
    }

    /// True for error kinds that are caused by bad caller input rather than
    /// a runtime/store failure. Used at the MCP boundary (§7) to decide
    /// whether a stack trace should ever be surfaced.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CtkError::Validation(_) | CtkError::NotFound(_) | CtkError::Ambiguous(_)
        )
    }
}

pub type CtkResult<T> = Result<T, CtkError>;
