//! Where readers pull history from.

use std::sync::Arc;

use evstore_core::{Event, StreamId};
use evstore_store::{EventRepository, StoreError, StreamStore};

use crate::error::ReaderResult;

/// Lazily pulled events of a range read.
pub type Events<'a> = Box<dyn Iterator<Item = ReaderResult<Event>> + 'a>;

/// Read side of a stream store, as needed by readers and views.
pub trait RangeSource: Send + Sync {
    /// Current version of `stream`; `None` when it does not exist.
    fn version(&self, stream: &StreamId) -> ReaderResult<Option<u64>>;

    /// Events `from..=to` of `stream`, ascending.
    fn scan(&self, stream: &StreamId, from: u64, to: u64) -> ReaderResult<Events<'_>>;

    fn streams(&self) -> ReaderResult<Vec<StreamId>>;
}

impl<S> RangeSource for Arc<S>
where
    S: RangeSource + ?Sized,
{
    fn version(&self, stream: &StreamId) -> ReaderResult<Option<u64>> {
        (**self).version(stream)
    }

    fn scan(&self, stream: &StreamId, from: u64, to: u64) -> ReaderResult<Events<'_>> {
        (**self).scan(stream, from, to)
    }

    fn streams(&self) -> ReaderResult<Vec<StreamId>> {
        (**self).streams()
    }
}

impl<R: EventRepository> RangeSource for StreamStore<R> {
    fn version(&self, stream: &StreamId) -> ReaderResult<Option<u64>> {
        match StreamStore::version(self, stream) {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::StreamNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn scan(&self, stream: &StreamId, from: u64, to: u64) -> ReaderResult<Events<'_>> {
        let cursor = StreamStore::scan(self, stream, from, to)?;
        Ok(Box::new(cursor.map(|e| e.map_err(Into::into))))
    }

    fn streams(&self) -> ReaderResult<Vec<StreamId>> {
        Ok(StreamStore::streams(self)?.into_iter().map(|s| s.id).collect())
    }
}
