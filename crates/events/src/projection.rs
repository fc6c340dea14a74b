//! Read-model contracts.
//!
//! Read models are **disposable**: events are the source of truth, so any
//! projection can be purged and rebuilt by replaying the streams it follows.

use std::collections::HashMap;

use evstore_core::{Event, StreamId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// The read model cannot continue with this stream (halts it).
    #[error("projection failed: {0}")]
    Fatal(String),

    /// Read model storage failed; the event may be retried.
    #[error("projection storage failed: {0}")]
    Storage(String),
}

impl ProjectionError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Result of handing one event to a [`Projector`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event was applied; the stream is now at the event's version.
    Applied,

    /// The event was already applied (at-least-once redelivery).
    Skipped,

    /// The event is ahead of the read model. `local` is the last version the
    /// read model holds for the stream (`None` if it holds nothing). The
    /// caller is expected to fill `(local + 1)..=event.version` and retry.
    OutOfSync { local: Option<u64> },
}

/// A per-stream read model fed by the reader client.
///
/// `apply` must be idempotent: events can arrive twice, once from the push
/// feed and once from a gap-fill range read.
pub trait Projector: Send {
    /// Last version applied for `stream`, if any.
    fn version(&self, stream: &StreamId) -> Result<Option<u64>, ProjectionError>;

    fn apply(&mut self, event: &Event) -> Result<ApplyOutcome, ProjectionError>;

    /// Drop the whole read model (used before a full replay).
    fn purge(&mut self) -> Result<(), ProjectionError>;
}

/// A read model driven by polling a single stream (typically the
/// application correlation stream).
pub trait View: Send {
    fn init(&mut self, params: &HashMap<String, String>, dev: bool) -> Result<(), ProjectionError>;

    fn purge(&mut self) -> Result<(), ProjectionError>;

    /// Last version applied from [`View::stream`]; `None` when empty.
    fn status(&self) -> Result<Option<u64>, ProjectionError>;

    /// Stream this view follows.
    fn stream(&self) -> StreamId;

    /// Hook invoked after a purge in rebuild mode, before replay starts.
    fn rebuild(&mut self) -> Result<(), ProjectionError> {
        Ok(())
    }

    fn apply(&mut self, event: &Event) -> Result<(), ProjectionError>;
}

impl<P: Projector + ?Sized> Projector for Box<P> {
    fn version(&self, stream: &StreamId) -> Result<Option<u64>, ProjectionError> {
        (**self).version(stream)
    }

    fn apply(&mut self, event: &Event) -> Result<ApplyOutcome, ProjectionError> {
        (**self).apply(event)
    }

    fn purge(&mut self) -> Result<(), ProjectionError> {
        (**self).purge()
    }
}
