//! Unified error type for polyframe.
//!
//! Backends (Polars, Arrow) map their own errors into [`FrameError::Backend`]
//! so callers never need to depend on backend error types.

use thiserror::Error;

/// Error returned by every fallible polyframe operation.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The raw input kind can't be turned into a dataframe by this backend.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    /// A value could not be converted to its declared type.
    #[error("type coercion error: {0}")]
    TypeCoercion(String),
    /// A referenced column does not exist.
    #[error("missing column: {0}")]
    MissingColumn(String),
    /// The operation is deliberately unsupported by this adapter.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// The operation is invalid for the current state (e.g. counting an unbounded frame).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A schema expression could not be parsed or is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A registration key is already taken.
    #[error("duplicate: {0}")]
    Duplicate(String),
    /// A registry lookup failed.
    #[error("not found: {0}")]
    NotFound(String),
    /// Error raised by a backend library (Polars, Arrow).
    #[error("backend error: {0}")]
    Backend(String),
    /// Internal invariant violation (e.g. a poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

impl FrameError {
    pub fn coercion(msg: impl Into<String>) -> Self {
        FrameError::TypeCoercion(msg.into())
    }

    pub fn missing_column(name: impl AsRef<str>, available: &[String]) -> Self {
        FrameError::MissingColumn(format!(
            "'{}' not found. Available columns: [{}]",
            name.as_ref(),
            available.join(", ")
        ))
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        FrameError::TypeCoercion(format!("invalid encoded value: {e}"))
    }
}

pub type Result<T, E = FrameError> = std::result::Result<T, E>;
