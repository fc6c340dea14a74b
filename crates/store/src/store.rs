//! The stream store: versioned, optimistically locked, idempotent appends.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use evstore_core::{
    AppendOptions, Appended, Event, EventPackage, NewEvent, PurgeStatus, Settings, Stream, StreamId,
};
use evstore_events::{Publisher, StripedLocks};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cursor::EventCursor;
use crate::error::{StoreError, StoreResult};
use crate::link::LinkPropagator;
use crate::lock::LockCoordinator;
use crate::repository::EventRepository;

/// Identity of a store instance, registered with the shard router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,
    pub version: String,
}

/// Append-only event store over an [`EventRepository`].
///
/// ## Append
///
/// 1. validate the event (id generated when absent, type required)
/// 2. answer a known event id with `Duplicate` carrying the original outcome
/// 3. lock the target stream and every linked stream
/// 4. resolve the target stream (deleted streams reject writes)
/// 5. apply [`LockCoordinator`]
/// 6. version = 0 for a new stream, else current + 1
/// 7. stage link events ([`LinkPropagator`]) and commit everything at once
/// 8. refresh the version cache and hand the event to the publishers
///
/// Anything failing before step 7 leaves the store untouched. Publisher
/// failures are logged and never fail the append.
///
/// Writes are serialized per stream (striped locks); reads never lock.
pub struct StreamStore<R> {
    repo: R,
    locks: StripedLocks,
    versions: RwLock<HashMap<StreamId, u64>>,
    publishers: Vec<Arc<dyn Publisher<Event>>>,
    page_size: usize,
    info: ServerInfo,
}

impl<R> StreamStore<R>
where
    R: EventRepository,
{
    pub fn new(repo: R) -> Self {
        Self::with_settings(repo, &Settings::default())
    }

    pub fn with_settings(repo: R, settings: &Settings) -> Self {
        Self {
            repo,
            locks: StripedLocks::default(),
            versions: RwLock::new(HashMap::new()),
            publishers: Vec::new(),
            page_size: settings.page_size,
            info: ServerInfo {
                id: settings.server_id.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Add a publisher notified after every successful append.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher<Event>>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[instrument(
        skip(self, event),
        fields(
            stream_id = %event.stream_id,
            event_type = %event.event_type,
            create = opts.create,
            lock = opts.lock
        ),
        err
    )]
    pub fn append(&self, event: NewEvent, opts: AppendOptions) -> StoreResult<Appended> {
        let event_id = event.validate()?;

        if let Some((_, version)) = self.repo.locate(&event_id)? {
            return Err(StoreError::Duplicate(Appended { event_id, version }));
        }

        let involved = std::iter::once(&event.stream_id).chain(event.linked_streams.iter());
        let _guards = self.locks.lock_all(involved)?;

        // A tombstone outranks the caller's create/lock preconditions.
        let current = self.repo.stream(&event.stream_id)?;
        if let Some(s) = current.as_ref().filter(|s| !s.is_writable()) {
            return Err(StoreError::StreamDeleted(s.id.clone()));
        }

        LockCoordinator::check(&event.stream_id, current.as_ref().map(|s| s.version), &opts)?;

        let (mut stream, version) = match current {
            Some(s) => {
                let next = s.version + 1;
                (s, next)
            }
            None => (Stream::new(event.stream_id.clone()), 0),
        };
        stream.version = version;

        let stored = Event::stored(event_id, event, version);
        let mut packages = vec![EventPackage::new(stream, vec![stored.clone()])];
        packages.extend(LinkPropagator::stage(&self.repo, &stored)?);

        self.repo.commit(&packages)?;
        self.remember(&packages);

        debug!(version, links = packages.len() - 1, "event appended");
        self.publish(&stored);

        Ok(Appended {
            event_id: stored.id,
            version,
        })
    }

    /// Current version of `stream`.
    pub fn version(&self, stream: &StreamId) -> StoreResult<u64> {
        if let Some(v) = self.versions.read().ok().and_then(|c| c.get(stream).copied()) {
            return Ok(v);
        }

        let s = self.get_stream(stream)?;
        if let Ok(mut cache) = self.versions.write() {
            cache.insert(s.id.clone(), s.version);
        }
        Ok(s.version)
    }

    pub fn stream(&self, stream: &StreamId) -> StoreResult<Stream> {
        self.get_stream(stream)
    }

    /// Full history ascending, plus the stream version at the time of the call.
    pub fn range(&self, stream: &StreamId) -> StoreResult<(EventCursor<'_, R>, u64)> {
        let s = self.get_stream(stream)?;
        let cursor = if s.purged {
            EventCursor::empty(&self.repo, s.id)
        } else {
            EventCursor::new(&self.repo, s.id, 0, s.version, self.page_size)
        };
        Ok((cursor, s.version))
    }

    /// Events `from..=to` of `stream`.
    pub fn scan(&self, stream: &StreamId, from: u64, to: u64) -> StoreResult<EventCursor<'_, R>> {
        if from > to {
            return Err(StoreError::InvalidRange { from, to });
        }
        let s = self.get_stream(stream)?;
        Ok(EventCursor::new(&self.repo, s.id, from, to, self.page_size))
    }

    /// Single event at `version`.
    pub fn read(&self, stream: &StreamId, version: u64) -> StoreResult<Event> {
        self.repo
            .event(stream, version)?
            .ok_or_else(|| StoreError::EventNotFound {
                stream_id: stream.clone(),
                version,
            })
    }

    pub fn streams(&self) -> StoreResult<Vec<Stream>> {
        self.repo.streams()
    }

    /// Streams whose id matches `pattern`.
    pub fn streams_matching(&self, pattern: &Regex) -> StoreResult<Vec<Stream>> {
        Ok(self
            .repo
            .streams()?
            .into_iter()
            .filter(|s| pattern.is_match(s.id.as_str()))
            .collect())
    }

    /// Tombstone a stream. History is kept until purged. Idempotent.
    #[instrument(skip(self), fields(stream_id = %stream), err)]
    pub fn delete(&self, stream: &StreamId) -> StoreResult<()> {
        let _guard = self.locks.lock(stream)?;
        let mut s = self.get_stream(stream)?;
        if s.deleted {
            return Ok(());
        }
        s.deleted = true;
        self.repo.save_stream(&s)?;
        info!("stream deleted");
        Ok(())
    }

    /// Request a purge of a deleted stream. The purge worker removes the
    /// events in batches; the returned status tracks progress.
    #[instrument(skip(self), fields(stream_id = %stream), err)]
    pub fn purge(&self, stream: &StreamId) -> StoreResult<PurgeStatus> {
        let _guard = self.locks.lock(stream)?;
        let mut s = self.get_stream(stream)?;
        if !s.deleted {
            return Err(StoreError::Validation(format!(
                "stream '{stream}' must be deleted before purge"
            )));
        }

        if let Some(existing) = self.repo.purges()?.into_iter().find(|p| p.stream_id == *stream) {
            return Ok(existing);
        }

        let status = PurgeStatus {
            stream_id: s.id.clone(),
            current: 0,
            total: if s.purged { 0 } else { s.version + 1 },
        };
        s.purging = true;
        self.repo.save_stream(&s)?;
        self.repo.save_purge(&status)?;
        info!(total = status.total, "purge requested");
        Ok(status)
    }

    pub fn purge_statuses(&self) -> StoreResult<Vec<PurgeStatus>> {
        self.repo.purges()
    }

    /// Advance every pending purge by up to `batch` events.
    /// Returns the number of purges that completed in this pass.
    pub fn purge_step(&self, batch: u64) -> StoreResult<usize> {
        let mut completed = 0;

        for mut status in self.repo.purges()? {
            let _guard = self.locks.lock(&status.stream_id)?;

            let removed = self.repo.remove_events(&status.stream_id, batch)?;
            status.current = (status.current + removed).min(status.total);

            if status.is_complete() || removed == 0 {
                if let Some(mut s) = self.repo.stream(&status.stream_id)? {
                    s.purging = false;
                    s.purged = true;
                    self.repo.save_stream(&s)?;
                }
                self.repo.remove_purge(&status.stream_id)?;
                info!(stream_id = %status.stream_id, total = status.total, "purge completed");
                completed += 1;
            } else {
                self.repo.save_purge(&status)?;
                debug!(stream_id = %status.stream_id, current = status.current, total = status.total, "purge progressed");
            }
        }

        Ok(completed)
    }

    fn get_stream(&self, stream: &StreamId) -> StoreResult<Stream> {
        self.repo
            .stream(stream)?
            .ok_or_else(|| StoreError::StreamNotFound(stream.clone()))
    }

    fn remember(&self, packages: &[EventPackage]) {
        if let Ok(mut cache) = self.versions.write() {
            for p in packages {
                cache.insert(p.stream.id.clone(), p.stream.version);
            }
        }
    }

    fn publish(&self, event: &Event) {
        for p in &self.publishers {
            if let Err(err) = p.publish(event.clone()) {
                warn!(stream_id = %event.stream_id, version = event.version, error = %err, "event publication failed");
            }
        }
    }
}

impl<R> std::fmt::Debug for StreamStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamStore")
            .field("info", &self.info)
            .field("publishers", &self.publishers.len())
            .field("page_size", &self.page_size)
            .finish()
    }
}
