//! Background purge of deleted streams.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use evstore_core::Settings;
use evstore_events::WorkerHandle;
use tracing::{error, info};

use crate::repository::EventRepository;
use crate::store::StreamStore;

/// Periodically advances pending purges in batches.
#[derive(Debug)]
pub struct PurgeWorker;

impl PurgeWorker {
    pub fn spawn<R>(store: Arc<StreamStore<R>>, settings: &Settings) -> WorkerHandle
    where
        R: EventRepository + 'static,
    {
        Self::spawn_with(store, settings.purge_interval, settings.purge_batch)
    }

    pub fn spawn_with<R>(store: Arc<StreamStore<R>>, every: Duration, batch: u64) -> WorkerHandle
    where
        R: EventRepository + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("evstore-purge".to_string())
            .spawn(move || purge_loop(store, shutdown_rx, every, batch))
            .expect("failed to spawn purge worker thread");

        WorkerHandle::new(shutdown_tx, join)
    }
}

fn purge_loop<R: EventRepository>(
    store: Arc<StreamStore<R>>,
    shutdown_rx: mpsc::Receiver<()>,
    every: Duration,
    batch: u64,
) {
    info!("purge worker started");

    loop {
        match store.purge_step(batch) {
            Ok(0) => {}
            Ok(done) => info!(completed = done, "purge pass finished"),
            Err(e) => error!(error = %e, "purge pass failed"),
        }

        match shutdown_rx.recv_timeout(every) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    info!("purge worker stopped");
}
