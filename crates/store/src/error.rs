use evstore_core::{Appended, DomainError, ErrorKind, StreamId};
use evstore_events::LockPoisoned;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Event store operation error.
///
/// `Duplicate` is not a failure of the write: it reports that the event id
/// was already stored and carries the original outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("concurrency conflict on '{stream_id}': expected version {expected}, found {actual}")]
    Concurrency {
        stream_id: StreamId,
        expected: u64,
        actual: u64,
    },

    #[error("stream '{0}' already exists")]
    AlreadyExists(StreamId),

    #[error("stream '{0}' not found")]
    StreamNotFound(StreamId),

    #[error("event {version} not found in stream '{stream_id}'")]
    EventNotFound { stream_id: StreamId, version: u64 },

    #[error("event '{}' already stored at version {}", .0.event_id, .0.version)]
    Duplicate(Appended),

    #[error("stream '{0}' is deleted")]
    StreamDeleted(StreamId),

    #[error("invalid range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) | StoreError::InvalidRange { .. } => ErrorKind::Validation,
            StoreError::Concurrency { .. } | StoreError::AlreadyExists(_) => ErrorKind::Concurrency,
            StoreError::StreamNotFound(_) | StoreError::EventNotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate(_) => ErrorKind::Duplicate,
            StoreError::StreamDeleted(_) => ErrorKind::Validation,
            StoreError::Backend(_) => ErrorKind::Internal,
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<LockPoisoned> for StoreError {
    fn from(err: LockPoisoned) -> Self {
        StoreError::Backend(err.to_string())
    }
}
