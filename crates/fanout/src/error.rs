use evstore_core::ErrorKind;
use thiserror::Error;

pub type FanoutResult<T> = Result<T, FanoutError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("invalid subscription: {0}")]
    Validation(String),

    #[error("subscription '{0}' not found")]
    NotFound(String),

    #[error("subscription backend failed: {0}")]
    Backend(String),
}

impl FanoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FanoutError::Validation(_) => ErrorKind::Validation,
            FanoutError::NotFound(_) => ErrorKind::NotFound,
            FanoutError::Backend(_) => ErrorKind::Internal,
        }
    }
}

/// Failure delivering one event to one subscriber. Logged, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery transport failed: {0}")]
    Transport(String),

    #[error("subscriber answered {0}")]
    Status(u16),
}
