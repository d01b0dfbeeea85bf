//! Error types for the access decision engine.

use thiserror::Error;

/// Result type alias for the access decision engine.
pub type Result<T, E = AccessError> = std::result::Result<T, E>;

/// Main error type for the access decision engine.
///
/// Denials are *not* errors: a denied request is a normal
/// [`AccessDecision`](crate::decision::AccessDecision) with `allowed == false`.
/// An `AccessError` means no decision was made at all, and callers are
/// expected to fail closed.
#[derive(Error, Debug)]
pub enum AccessError {
    /// Rule store or directory lookup failure; the decision pipeline was
    /// aborted without a verdict.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored rule data failed to parse.
    ///
    /// The engine normally downgrades these to a skipped rule; this variant
    /// only surfaces from APIs that parse rule data directly.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invalid input supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors from stored access-control rule data.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Invalid attribute condition '{key}': {message}")]
    InvalidCondition { key: String, message: String },

    #[error("Invalid column list: {message}")]
    InvalidColumnList { message: String },

    #[error("Unknown clearance level '{value}'")]
    UnknownClearance { value: String },
}

/// Collaborator (rule store / directory) errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Query failed: {message}")]
    QueryFailed { message: String },

    #[error("Lookup timed out: {message}")]
    Timeout { message: String },
}

impl AccessError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl RuleError {
    /// Create an invalid-condition error.
    pub fn invalid_condition(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-column-list error.
    pub fn invalid_column_list(message: impl Into<String>) -> Self {
        Self::InvalidColumnList {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Create a query-failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }
}
