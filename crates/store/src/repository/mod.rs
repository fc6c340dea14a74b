//! Storage boundary behind the stream store.
//!
//! The store owns versioning, locking and link semantics; a repository only
//! persists what it is given. Backends must make `commit` atomic across every
//! package it receives.

use std::sync::Arc;

use evstore_core::{Event, EventId, EventPackage, PurgeStatus, Stream, StreamId};

use crate::error::StoreResult;

pub mod in_memory;

pub use in_memory::InMemoryEventRepository;

/// Persistent home of streams and events.
///
/// ## Commit semantics
///
/// `commit` writes every package or none. For each package the backend must
/// check that it continues the stored stream: the first event is version 0 for
/// a new stream, or `stored.version + 1` otherwise (`Concurrency` if not). An
/// event id that is already stored fails the whole commit with `Duplicate`.
///
/// ## Reads
///
/// Reads may race with commits. A reader sees either the state before or
/// after a commit, never part of one.
pub trait EventRepository: Send + Sync {
    fn stream(&self, id: &StreamId) -> StoreResult<Option<Stream>>;

    fn streams(&self) -> StoreResult<Vec<Stream>>;

    /// Save stream metadata (delete / purge flags). The version is not
    /// touched by this call.
    fn save_stream(&self, stream: &Stream) -> StoreResult<()>;

    /// Stream and version an event id was stored at, if it exists.
    fn locate(&self, event_id: &EventId) -> StoreResult<Option<(StreamId, u64)>>;

    fn event(&self, stream: &StreamId, version: u64) -> StoreResult<Option<Event>>;

    /// Events of `stream` with `from <= version <= to`, ascending, at most `limit`.
    fn events(&self, stream: &StreamId, from: u64, to: u64, limit: usize) -> StoreResult<Vec<Event>>;

    fn commit(&self, packages: &[EventPackage]) -> StoreResult<()>;

    /// Remove up to `limit` of the oldest remaining events of `stream`,
    /// returning how many were removed.
    fn remove_events(&self, stream: &StreamId, limit: u64) -> StoreResult<u64>;

    fn save_purge(&self, status: &PurgeStatus) -> StoreResult<()>;

    fn remove_purge(&self, stream: &StreamId) -> StoreResult<()>;

    fn purges(&self) -> StoreResult<Vec<PurgeStatus>>;
}

impl<R> EventRepository for Arc<R>
where
    R: EventRepository + ?Sized,
{
    fn stream(&self, id: &StreamId) -> StoreResult<Option<Stream>> {
        (**self).stream(id)
    }

    fn streams(&self) -> StoreResult<Vec<Stream>> {
        (**self).streams()
    }

    fn save_stream(&self, stream: &Stream) -> StoreResult<()> {
        (**self).save_stream(stream)
    }

    fn locate(&self, event_id: &EventId) -> StoreResult<Option<(StreamId, u64)>> {
        (**self).locate(event_id)
    }

    fn event(&self, stream: &StreamId, version: u64) -> StoreResult<Option<Event>> {
        (**self).event(stream, version)
    }

    fn events(&self, stream: &StreamId, from: u64, to: u64, limit: usize) -> StoreResult<Vec<Event>> {
        (**self).events(stream, from, to, limit)
    }

    fn commit(&self, packages: &[EventPackage]) -> StoreResult<()> {
        (**self).commit(packages)
    }

    fn remove_events(&self, stream: &StreamId, limit: u64) -> StoreResult<u64> {
        (**self).remove_events(stream, limit)
    }

    fn save_purge(&self, status: &PurgeStatus) -> StoreResult<()> {
        (**self).save_purge(status)
    }

    fn remove_purge(&self, stream: &StreamId) -> StoreResult<()> {
        (**self).remove_purge(stream)
    }

    fn purges(&self) -> StoreResult<Vec<PurgeStatus>> {
        (**self).purges()
    }
}
