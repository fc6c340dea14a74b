use evstore_core::ErrorKind;
use evstore_events::LockPoisoned;
use thiserror::Error;

pub type RouterResult<T> = Result<T, RouterError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("invalid host: {0}")]
    Validation(String),

    /// A sticky assignment points at a host that is no longer registered.
    #[error("host '{0}' not registered")]
    HostNotRegistered(String),

    #[error("no available host")]
    NoAvailableHost,

    #[error("host '{0}' not found")]
    HostNotFound(String),

    #[error("router backend failed: {0}")]
    Backend(String),
}

impl RouterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::Validation(_) => ErrorKind::Validation,
            RouterError::HostNotRegistered(_) | RouterError::NoAvailableHost => ErrorKind::Routing,
            RouterError::HostNotFound(_) => ErrorKind::NotFound,
            RouterError::Backend(_) => ErrorKind::Internal,
        }
    }
}

impl From<LockPoisoned> for RouterError {
    fn from(err: LockPoisoned) -> Self {
        RouterError::Backend(err.to_string())
    }
}
