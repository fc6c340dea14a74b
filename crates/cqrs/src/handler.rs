//! Event handler contract.

use std::borrow::Cow;

use evstore_core::{AppendOptions, Entity, Payload};

use crate::command::Actor;
use crate::error::CqrsResult;

/// Whether a handler runs during replay or on a live command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Rebuilding state from stored events: mutate the entity only.
    Replay,
    /// Handling a new command: the event may still be enriched.
    Live,
}

/// Context handed to a handler invocation.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub mode: Mode,
    pub entity_id: &'a str,
    /// Issuer of the command; `None` during replay.
    pub actor: Option<&'a Actor>,
}

impl<'a> HandlerContext<'a> {
    pub fn replay(entity_id: &'a str) -> Self {
        Self {
            mode: Mode::Replay,
            entity_id,
            actor: None,
        }
    }

    pub fn live(entity_id: &'a str, actor: &'a Actor) -> Self {
        Self {
            mode: Mode::Live,
            entity_id,
            actor: Some(actor),
        }
    }

    pub fn is_live(&self) -> bool {
        self.mode == Mode::Live
    }
}

/// The event as seen by a handler.
///
/// During replay the payload borrows the stored event; live handlers may
/// write to it (`payload.to_mut()`) and the result is what gets stored.
#[derive(Debug, Clone)]
pub struct HandledEvent<'a> {
    pub event_type: &'a str,
    /// Stored version on replay, candidate version on the live path.
    pub version: u64,
    pub payload: Cow<'a, Payload>,
}

/// Applies events of the types it declares to an entity.
pub trait EventHandler: Send + Sync {
    fn event_types(&self) -> Vec<String>;

    /// Whether events of `event_type` must only carry base-schema fields,
    /// when the entity declares one.
    fn checks_base(&self, _event_type: &str) -> bool {
        false
    }

    /// Whether the entity must declare a base schema for this handler.
    fn requires_base(&self) -> bool {
        false
    }

    /// Mutate `entity` for `event` and return the store preconditions to
    /// use if the event is being appended.
    fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        event: &mut HandledEvent<'_>,
        entity: &mut Entity,
    ) -> CqrsResult<AppendOptions>;
}
