//! Command boundary types.

use evstore_core::{EventId, Payload};
use serde::{Deserialize, Serialize};

/// Who issues a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub account_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, account_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            account_id: account_id.into(),
            role: role.into(),
        }
    }
}

/// A request to emit `event_type` on an entity.
///
/// `entity_id` is generated when absent; `event_id` makes the command
/// idempotent; `version_lock` requires the entity stream to be at that
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_lock: Option<u64>,
}

impl Command {
    pub fn new(entity_type: impl Into<String>, event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: None,
            event_type: event_type.into(),
            event_id: None,
            payload,
            version_lock: None,
        }
    }

    pub fn for_entity(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn locked(mut self, version: u64) -> Self {
        self.version_lock = Some(version);
        self
    }
}

/// Result of a handled command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub entity_id: String,
    pub event_id: EventId,
    pub version: u64,
}
