//! Push-fed read-model client with catch-up and gap filling.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use evstore_core::{Event, StreamId};
use evstore_events::{ApplyOutcome, ProjectionError, Projector, Subscription, WorkerHandle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{ReaderError, ReaderResult};
use crate::source::RangeSource;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Purge the read model before catching up.
    #[serde(default)]
    pub full_replay: bool,
    /// Skip the catch-up phase and only follow the feed.
    #[serde(default)]
    pub no_catch_up: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Stopped,
    CatchingUp,
    Listening,
}

struct Shared<S, P> {
    source: S,
    projector: Mutex<P>,
    filters: Vec<Regex>,
    state: Mutex<ReaderState>,
    halted: Mutex<BTreeMap<StreamId, ProjectionError>>,
}

/// Feeds a [`Projector`] from a push feed of appended events.
///
/// On start the client optionally catches up: every stream matching the
/// filters is range-read from the projector's version to the store's. It
/// then listens to the feed on a worker thread. An event the projector
/// reports as ahead of it triggers a range read of the gap.
///
/// A fatal projection error halts the affected stream only; halted streams
/// are reported by [`ReaderClient::halted`] and ignored afterwards.
pub struct ReaderClient<S, P> {
    shared: Arc<Shared<S, P>>,
    options: ReaderOptions,
    worker: Option<WorkerHandle>,
}

impl<S, P> ReaderClient<S, P>
where
    S: RangeSource + 'static,
    P: Projector + 'static,
{
    pub fn new(source: S, projector: P) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                projector: Mutex::new(projector),
                filters: Vec::new(),
                state: Mutex::new(ReaderState::Stopped),
                halted: Mutex::new(BTreeMap::new()),
            }),
            options: ReaderOptions::default(),
            worker: None,
        }
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Only follow streams whose id matches `pattern`. Without filters every
    /// stream is followed.
    pub fn with_filter(mut self, pattern: &str) -> ReaderResult<Self> {
        let re = Regex::new(pattern).map_err(|e| ReaderError::Filter {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let shared = Arc::get_mut(&mut self.shared).ok_or(ReaderError::AlreadyRunning)?;
        shared.filters.push(re);
        Ok(self)
    }

    pub fn state(&self) -> ReaderState {
        self.shared.state.lock().map_or(ReaderState::Stopped, |s| *s)
    }

    /// Streams stopped by a fatal projection error.
    pub fn halted(&self) -> Vec<(StreamId, ProjectionError)> {
        self.shared
            .halted
            .lock()
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Run `f` against the projector while holding it.
    pub fn inspect<T>(&self, f: impl FnOnce(&P) -> T) -> ReaderResult<T> {
        Ok(f(&*self.shared.projector()?))
    }

    /// Catch up (unless disabled), then follow `feed` on a worker thread.
    #[instrument(skip(self, feed), fields(full_replay = self.options.full_replay, no_catch_up = self.options.no_catch_up), err)]
    pub fn start(&mut self, feed: Subscription<Event>) -> ReaderResult<()> {
        if self.worker.is_some() {
            return Err(ReaderError::AlreadyRunning);
        }
        let shared = Arc::clone(&self.shared);
        shared.set_state(ReaderState::CatchingUp)?;

        if self.options.full_replay {
            shared.projector()?.purge()?;
            shared.halted.lock().map_err(|_| ReaderError::Poisoned)?.clear();
            info!("read model purged for full replay");
        }

        if !self.options.no_catch_up {
            if let Err(err) = shared.catch_up() {
                shared.set_state(ReaderState::Stopped)?;
                return Err(err);
            }
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        shared.set_state(ReaderState::Listening)?;
        let join = thread::Builder::new()
            .name("evstore-reader".to_string())
            .spawn(move || listen(&shared, &feed, &shutdown_rx))
            .expect("failed to spawn reader thread");

        self.worker = Some(WorkerHandle::new(shutdown_tx, join));
        Ok(())
    }

    /// Stop listening. The event in flight, if any, is still applied.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        let _ = self.shared.set_state(ReaderState::Stopped);
    }

    /// Range-read every followed stream up to the store's version now.
    pub fn catch_up(&self) -> ReaderResult<usize> {
        self.shared.catch_up()
    }
}

impl<S, P> Drop for ReaderClient<S, P> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl<S, P> Shared<S, P>
where
    S: RangeSource,
    P: Projector,
{
    fn projector(&self) -> ReaderResult<MutexGuard<'_, P>> {
        self.projector.lock().map_err(|_| ReaderError::Poisoned)
    }

    fn set_state(&self, state: ReaderState) -> ReaderResult<()> {
        *self.state.lock().map_err(|_| ReaderError::Poisoned)? = state;
        Ok(())
    }

    fn follows(&self, stream: &StreamId) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|re| re.is_match(stream.as_str()))
    }

    fn is_halted(&self, stream: &StreamId) -> bool {
        self.halted.lock().map_or(true, |h| h.contains_key(stream))
    }

    fn halt(&self, stream: &StreamId, err: ProjectionError) {
        warn!(stream_id = %stream, error = %err, "stream halted");
        if let Ok(mut halted) = self.halted.lock() {
            halted.insert(stream.clone(), err);
        }
    }

    fn catch_up(&self) -> ReaderResult<usize> {
        let mut applied = 0;
        for stream in self.source.streams()? {
            if !self.follows(&stream) || self.is_halted(&stream) {
                continue;
            }
            let Some(remote) = self.source.version(&stream)? else {
                continue;
            };
            let mut projector = self.projector()?;
            let from = projector.version(&stream)?.map_or(0, |v| v + 1);
            if from <= remote {
                applied += self.fill(&mut projector, &stream, from, remote)?;
            }
        }
        debug!(applied, "catch-up finished");
        Ok(applied)
    }

    fn deliver(&self, event: &Event) -> ReaderResult<()> {
        if !self.follows(&event.stream_id) || self.is_halted(&event.stream_id) {
            return Ok(());
        }

        let mut projector = self.projector()?;
        match projector.apply(event) {
            Ok(ApplyOutcome::Applied | ApplyOutcome::Skipped) => Ok(()),
            Ok(ApplyOutcome::OutOfSync { local }) => {
                let from = local.map_or(0, |v| v + 1);
                debug!(stream_id = %event.stream_id, from, to = event.version, "filling gap");
                self.fill(&mut projector, &event.stream_id, from, event.version)
                    .map(|_| ())
            }
            Err(err @ ProjectionError::Fatal(_)) => {
                self.halt(&event.stream_id, err);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Apply `from..=to` of `stream` in order. Returns how many events the
    /// projector applied.
    fn fill(&self, projector: &mut P, stream: &StreamId, from: u64, to: u64) -> ReaderResult<usize> {
        let mut applied = 0;
        for event in self.source.scan(stream, from, to)? {
            let event = event?;
            match projector.apply(&event) {
                Ok(ApplyOutcome::Applied) => applied += 1,
                Ok(ApplyOutcome::Skipped) => {}
                Ok(ApplyOutcome::OutOfSync { local }) => {
                    let err = ProjectionError::fatal(format!(
                        "gap persists at version {} (read model at {local:?})",
                        event.version
                    ));
                    self.halt(stream, err);
                    break;
                }
                Err(err @ ProjectionError::Fatal(_)) => {
                    self.halt(stream, err);
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(applied)
    }
}

fn listen<S, P>(shared: &Shared<S, P>, feed: &Subscription<Event>, shutdown_rx: &mpsc::Receiver<()>)
where
    S: RangeSource,
    P: Projector,
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match feed.recv_timeout(tick) {
            Ok(event) => {
                if let Err(err) = shared.deliver(&event) {
                    warn!(stream_id = %event.stream_id, version = event.version, error = %err, "reader failed to apply event");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = shared.set_state(ReaderState::Stopped);
}
