//! Bounded push feed for a single reader.

use std::sync::mpsc::{self, SyncSender, TrySendError};

use evstore_core::{Event, Settings};
use evstore_events::{BusError, Publisher, Subscription};
use tracing::warn;

/// Publisher side of a bounded feed.
///
/// A full feed drops the event instead of blocking the append. The reader
/// repairs the loss with a range read when the next event of that stream
/// arrives ahead of its read model.
#[derive(Debug, Clone)]
pub struct ReaderFeed {
    tx: SyncSender<Event>,
}

impl ReaderFeed {
    pub fn bounded(capacity: usize) -> (Self, Subscription<Event>) {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        (Self { tx }, Subscription::new(rx))
    }

    pub fn from_settings(settings: &Settings) -> (Self, Subscription<Event>) {
        Self::bounded(settings.reader_queue_capacity)
    }
}

impl Publisher<Event> for ReaderFeed {
    fn publish(&self, event: Event) -> Result<(), BusError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                warn!(stream_id = %event.stream_id, version = event.version, "reader feed full, event dropped");
                Err(BusError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(BusError::Closed),
        }
    }
}
