//! Cross-entity reference constraints.

use evstore_core::{Entity, StreamId};
use evstore_store::{EventRepository, StoreError, StreamStore};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CqrsError, CqrsResult};

/// Declared shape of a reference field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefShape {
    /// A single entity id (string).
    Single,
    /// An array of entity ids.
    Many,
}

/// `field` of this entity holds id(s) of `entity` instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub entity: String,
    pub field: String,
    pub nullable: bool,
    pub shape: RefShape,
}

impl Reference {
    pub fn single(field: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            nullable: false,
            shape: RefShape::Single,
        }
    }

    pub fn many(field: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            shape: RefShape::Many,
            ..Self::single(field, entity)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Check the reference against `entity`'s current payload.
    pub fn check<C: EntityLookup + ?Sized>(&self, entity: &Entity, lookup: &C) -> CqrsResult<()> {
        match (self.shape, entity.field(&self.field)) {
            (_, None | Some(JsonValue::Null)) => self.absent(),
            (RefShape::Single, Some(JsonValue::String(id))) if id.is_empty() => self.absent(),
            (RefShape::Single, Some(JsonValue::String(id))) => self.exists(lookup, id),
            (RefShape::Many, Some(JsonValue::Array(ids))) if ids.is_empty() => self.absent(),
            (RefShape::Many, Some(JsonValue::Array(ids))) => ids.iter().try_for_each(|v| match v {
                JsonValue::String(id) if !id.is_empty() => self.exists(lookup, id),
                _ => Err(self.invalid("expected an array of ids")),
            }),
            (RefShape::Single, Some(_)) => Err(self.invalid("expected an id")),
            (RefShape::Many, Some(_)) => Err(self.invalid("expected an array of ids")),
        }
    }

    fn absent(&self) -> CqrsResult<()> {
        if self.nullable {
            Ok(())
        } else {
            Err(self.invalid("required"))
        }
    }

    fn exists<C: EntityLookup + ?Sized>(&self, lookup: &C, id: &str) -> CqrsResult<()> {
        if lookup.exists(&self.entity, id)? {
            Ok(())
        } else {
            Err(self.invalid(format!("{} '{}' does not exist", self.entity, id)))
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CqrsError {
        CqrsError::InvalidReference {
            field: self.field.clone(),
            reason: reason.into(),
        }
    }
}

/// Answers whether an entity instance exists.
pub trait EntityLookup {
    fn exists(&self, entity: &str, id: &str) -> CqrsResult<bool>;
}

impl<R: EventRepository> EntityLookup for StreamStore<R> {
    fn exists(&self, entity: &str, id: &str) -> CqrsResult<bool> {
        let Ok(stream) = StreamId::for_entity(entity, id) else {
            return Ok(false);
        };
        match self.version(&stream) {
            Ok(_) => Ok(true),
            Err(StoreError::StreamNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
