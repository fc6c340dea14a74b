//! Entity projection rebuilt by replay.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DomainError, DomainResult};
use crate::event::Payload;

/// Current state of an entity, derived from its stream. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub version: u64,
    pub deleted: bool,
    pub payload: Payload,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.payload.get(name)
    }

    /// Shallow merge: every top-level field of `patch` overwrites ours.
    pub fn merge(&mut self, patch: &Payload) {
        for (k, v) in patch {
            self.payload.insert(k.clone(), v.clone());
        }
    }

    /// Decode the payload into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(JsonValue::Object(self.payload.clone()))
            .map_err(|e| DomainError::validation(format!("entity decode failed: {e}")))
    }
}
