use evstore_core::ErrorKind;
use evstore_events::ProjectionError;
use evstore_store::StoreError;
use thiserror::Error;

pub type ReaderResult<T> = Result<T, ReaderError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("invalid stream filter '{pattern}': {reason}")]
    Filter { pattern: String, reason: String },

    #[error("reader already running")]
    AlreadyRunning,

    #[error("reader state poisoned")]
    Poisoned,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::Filter { .. } | ReaderError::AlreadyRunning => ErrorKind::Validation,
            ReaderError::Store(e) => e.kind(),
            ReaderError::Poisoned | ReaderError::Projection(_) => ErrorKind::Internal,
        }
    }
}
