use evstore_core::{DomainError, ErrorKind};
use evstore_events::LockPoisoned;
use evstore_store::StoreError;
use thiserror::Error;

pub type CqrsResult<T> = Result<T, CqrsError>;

/// Command and aggregation errors. All are returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CqrsError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("event {event_type} not handled by entity '{entity}'")]
    EventNotHandled { entity: String, event_type: String },

    /// Replay met an event out of order; fatal to this aggregation.
    #[error("failed to aggregate entity {entity_id}: unordered events (at version {at}, found {found})")]
    Ordering { entity_id: String, at: u64, found: u64 },

    #[error("entity '{0}' is deleted, undelete it first")]
    EntityDeleted(String),

    #[error("invalid field, not in base schema: {0}")]
    UnknownField(String),

    #[error("invalid reference {field}: {reason}")]
    InvalidReference { field: String, reason: String },

    #[error("failed validation: {validator} - {reason}")]
    ValidationFailed { validator: String, reason: String },

    #[error("role '{role}' may not emit {event_type}")]
    Unauthorized { role: String, event_type: String },

    #[error("invalid command: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CqrsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CqrsError::UnknownEntity(_) => ErrorKind::NotFound,
            CqrsError::Ordering { .. } => ErrorKind::Ordering,
            CqrsError::Unauthorized { .. } => ErrorKind::Unauthorized,
            CqrsError::Store(e) => e.kind(),
            CqrsError::EventNotHandled { .. }
            | CqrsError::EntityDeleted(_)
            | CqrsError::UnknownField(_)
            | CqrsError::InvalidReference { .. }
            | CqrsError::ValidationFailed { .. }
            | CqrsError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl From<DomainError> for CqrsError {
    fn from(err: DomainError) -> Self {
        CqrsError::Validation(err.to_string())
    }
}

impl From<LockPoisoned> for CqrsError {
    fn from(err: LockPoisoned) -> Self {
        CqrsError::Store(StoreError::from(err))
    }
}

/// Entity configuration mistakes, detected when the registry is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("entity '{0}' registered twice")]
    DuplicateEntity(String),

    #[error("entity '{entity}': validator '{validator}' added twice")]
    DuplicateValidator { entity: String, validator: String },

    #[error("entity '{entity}': handler for {event_type} checks the base schema but none is set")]
    MissingBaseSchema { entity: String, event_type: String },

    #[error("invalid entity name '{0}'")]
    InvalidName(String),
}
