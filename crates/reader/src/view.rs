//! Polling runner for single-stream views.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use evstore_core::{Settings, StreamId};
use evstore_events::{ProjectionError, View, WorkerHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ReaderError, ReaderResult};
use crate::source::RangeSource;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Init and follow the stream.
    #[default]
    Normal,
    /// Purge, init, run the view's rebuild hook, then follow from scratch.
    Rebuild,
    /// Init and purge, nothing else.
    Purge,
}

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub name: String,
    pub mode: RunMode,
    pub params: HashMap<String, String>,
    pub dev: bool,
    pub poll_interval: Duration,
}

impl ViewConfig {
    pub fn new(name: impl Into<String>, settings: &Settings) -> Self {
        Self {
            name: name.into(),
            mode: RunMode::Normal,
            params: HashMap::new(),
            dev: false,
            poll_interval: settings.view_poll_interval,
        }
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = every;
        self
    }
}

/// Progress of a running view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewProgress {
    pub polls: u64,
    pub applied: u64,
    /// Set when an apply failed; the runner stopped on it.
    pub failure: Option<ProjectionError>,
}

/// Drives a [`View`] by polling its stream: every `poll_interval`, or
/// earlier when [`ViewRunner::wake`] is called.
///
/// Each poll compares the view's status with the stream version and applies
/// the missing events in order. A view that reports no status is replayed
/// from version 0. A failing apply stops the runner.
pub struct ViewRunner {
    name: String,
    wake: SyncSender<()>,
    progress: Arc<RwLock<ViewProgress>>,
    worker: Option<WorkerHandle>,
}

impl ViewRunner {
    /// Prepare `view` according to `config.mode` and start polling.
    ///
    /// `RunMode::Purge` only purges the view and returns `None`.
    pub fn run<S, V>(source: S, mut view: V, config: ViewConfig) -> ReaderResult<Option<Self>>
    where
        S: RangeSource + 'static,
        V: View + 'static,
    {
        match config.mode {
            RunMode::Purge => {
                view.init(&config.params, config.dev)?;
                view.purge()?;
                info!(view = %config.name, "view purged");
                return Ok(None);
            }
            RunMode::Rebuild => {
                view.purge()?;
                view.init(&config.params, config.dev)?;
                view.rebuild()?;
                info!(view = %config.name, "view rebuilding");
            }
            RunMode::Normal => view.init(&config.params, config.dev)?,
        }

        let progress = Arc::new(RwLock::new(ViewProgress::default()));
        let (wake_tx, wake_rx) = mpsc::sync_channel::<()>(2);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let name = config.name.clone();
        let shared = Arc::clone(&progress);
        let join = thread::Builder::new()
            .name(format!("evstore-view-{name}"))
            .spawn(move || {
                poll_loop(&name, &source, &mut view, config.poll_interval, &shared, &wake_rx, &shutdown_rx)
            })
            .expect("failed to spawn view thread");

        Ok(Some(Self {
            name: config.name,
            wake: wake_tx,
            progress,
            worker: Some(WorkerHandle::new(shutdown_tx, join)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll now instead of waiting for the next interval.
    pub fn wake(&self) {
        // A full channel already holds a pending wake-up.
        if let Err(TrySendError::Disconnected(_)) = self.wake.try_send(()) {
            debug!(view = %self.name, "wake ignored, view stopped");
        }
    }

    pub fn progress(&self) -> ReaderResult<ViewProgress> {
        self.progress
            .read()
            .map(|p| p.clone())
            .map_err(|_| ReaderError::Poisoned)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop polling; an apply in progress completes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.request_stop();
            let _ = self.wake.try_send(());
            worker.shutdown();
        }
    }
}

impl Drop for ViewRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply everything `view` is missing from `stream`. Returns the number of
/// applied events.
pub fn poll_once<S, V>(source: &S, view: &mut V, stream: &StreamId) -> ReaderResult<u64>
where
    S: RangeSource + ?Sized,
    V: View + ?Sized,
{
    let Some(remote) = source.version(stream)? else {
        return Ok(0);
    };
    let from = match view.status()? {
        None => 0,
        Some(local) if local < remote => local + 1,
        Some(_) => return Ok(0),
    };

    let mut applied = 0;
    for event in source.scan(stream, from, remote)? {
        view.apply(&event?)?;
        applied += 1;
    }
    Ok(applied)
}

fn poll_loop<S, V>(
    name: &str,
    source: &S,
    view: &mut V,
    every: Duration,
    progress: &RwLock<ViewProgress>,
    wake_rx: &mpsc::Receiver<()>,
    shutdown_rx: &mpsc::Receiver<()>,
) where
    S: RangeSource,
    V: View,
{
    let stream = view.stream();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match poll_once(source, view, &stream) {
            Ok(applied) => {
                if let Ok(mut p) = progress.write() {
                    p.polls += 1;
                    p.applied += applied;
                }
                if applied > 0 {
                    debug!(view = name, stream_id = %stream, applied, "view caught up");
                }
            }
            Err(ReaderError::Projection(err)) => {
                error!(view = name, stream_id = %stream, error = %err, "view failed to apply event");
                if let Ok(mut p) = progress.write() {
                    p.failure = Some(err);
                }
                break;
            }
            Err(err) => warn!(view = name, stream_id = %stream, error = %err, "view poll failed"),
        }

        match wake_rx.recv_timeout(every) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
