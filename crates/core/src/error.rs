//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of the data model itself
/// (malformed identifiers, malformed events, broken package invariants).
/// Storage and routing concerns have their own error types in their crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty event type).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A data-model invariant was violated (e.g. non-contiguous package).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. empty or oversized stream id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Coarse classification shared by every layer's error type.
///
/// Transport bindings map this to status codes; callers use it to decide
/// whether to retry (`Concurrency`), correct the request (`Validation`) or
/// treat the outcome as already applied (`Duplicate`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Concurrency,
    NotFound,
    Duplicate,
    Routing,
    Ordering,
    Unauthorized,
    Internal,
}

impl From<&DomainError> for ErrorKind {
    fn from(_: &DomainError) -> Self {
        ErrorKind::Validation
    }
}
