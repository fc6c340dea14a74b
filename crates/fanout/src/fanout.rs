//! Fire-and-forget delivery of appended events to matching webhooks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use evstore_core::{Event, Settings};
use evstore_events::{BusError, Publisher, WorkerHandle};
use tracing::{debug, info, instrument, warn};

use crate::deliver::Deliverer;
use crate::error::{FanoutError, FanoutResult};
use crate::repository::SubscriptionRepository;
use crate::subscription::{CompiledWebhook, Webhook};

type Cache = Arc<RwLock<BTreeMap<String, CompiledWebhook>>>;

/// Delivery counters.
#[derive(Debug, Default)]
pub struct FanoutStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`FanoutStats`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FanoutCounts {
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl FanoutStats {
    pub fn snapshot(&self) -> FanoutCounts {
        FanoutCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Webhook fanout.
///
/// Sits behind the store as a [`Publisher`]: `publish` only enqueues into a
/// bounded queue and returns. A worker thread drains the queue and POSTs each
/// event to every subscription whose regex matches the stream id.
///
/// Delivery is best-effort: a full queue drops the event, a failed delivery
/// is logged and counted. Nothing is retried, and one slow subscriber only
/// delays the ones after it for the same event.
pub struct PubFanout<S> {
    repo: S,
    cache: Cache,
    queue: SyncSender<Event>,
    stats: Arc<FanoutStats>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl<S> PubFanout<S>
where
    S: SubscriptionRepository,
{
    /// Load persisted subscriptions and start the delivery worker.
    pub fn start<D>(repo: S, deliverer: D, settings: &Settings) -> FanoutResult<Self>
    where
        D: Deliverer + 'static,
    {
        Self::start_with_capacity(repo, deliverer, settings.fanout_capacity)
    }

    pub fn start_with_capacity<D>(repo: S, deliverer: D, capacity: usize) -> FanoutResult<Self>
    where
        D: Deliverer + 'static,
    {
        let mut compiled = BTreeMap::new();
        for hook in repo.list()? {
            match hook.compile() {
                Ok(c) => {
                    compiled.insert(hook.id.clone(), c);
                }
                Err(e) => warn!(subscription = %hook.id, error = %e, "skipping invalid stored subscription"),
            }
        }
        info!(subscriptions = compiled.len(), "fanout starting");

        let cache: Cache = Arc::new(RwLock::new(compiled));
        let stats = Arc::new(FanoutStats::default());
        let (queue, rx) = mpsc::sync_channel::<Event>(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let worker_cache = cache.clone();
        let worker_stats = stats.clone();
        let join = thread::Builder::new()
            .name("evstore-fanout".to_string())
            .spawn(move || delivery_loop(rx, shutdown_rx, worker_cache, worker_stats, deliverer))
            .expect("failed to spawn fanout worker thread");

        Ok(Self {
            repo,
            cache,
            queue,
            stats,
            worker: Mutex::new(Some(WorkerHandle::new(shutdown_tx, join))),
        })
    }

    /// Validate, persist and activate a subscription (replaces same id).
    #[instrument(skip(self, webhook), fields(subscription = %webhook.id), err)]
    pub fn add_subscription(&self, webhook: Webhook) -> FanoutResult<()> {
        let compiled = webhook.compile()?;
        self.repo.store(&webhook)?;
        self.cache_mut()?.insert(webhook.id.clone(), compiled);
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub fn remove_subscription(&self, id: &str) -> FanoutResult<()> {
        self.repo.delete(id)?;
        self.cache_mut()?.remove(id);
        Ok(())
    }

    pub fn list_subscriptions(&self) -> FanoutResult<Vec<Webhook>> {
        self.repo.list()
    }

    pub fn stats(&self) -> FanoutCounts {
        self.stats.snapshot()
    }

    /// Stop the worker after the event in flight. Queued events are discarded.
    pub fn stop(&self) {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(h) = handle {
            h.shutdown();
        }
    }

    fn cache_mut(&self) -> FanoutResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, CompiledWebhook>>> {
        self.cache
            .write()
            .map_err(|_| FanoutError::Backend("subscription cache poisoned".to_string()))
    }
}

impl<S> Publisher<Event> for PubFanout<S>
where
    S: SubscriptionRepository,
{
    fn publish(&self, event: Event) -> Result<(), BusError> {
        match self.queue.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(stream_id = %event.stream_id, version = event.version, "fanout queue full, event dropped");
                Err(BusError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(BusError::Closed),
        }
    }
}

impl<S> Drop for PubFanout<S> {
    fn drop(&mut self) {
        if let Some(h) = self.worker.get_mut().ok().and_then(|w| w.take()) {
            h.shutdown();
        }
    }
}

fn delivery_loop<D: Deliverer>(
    rx: Receiver<Event>,
    shutdown_rx: Receiver<()>,
    cache: Cache,
    stats: Arc<FanoutStats>,
    deliverer: D,
) {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let event = match rx.recv_timeout(tick) {
            Ok(e) => e,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let targets: Vec<(String, String)> = match cache.read() {
            Ok(c) => c
                .values()
                .filter(|w| w.matches(event.stream_id.as_str()))
                .map(|w| (w.webhook().id.clone(), w.webhook().url.clone()))
                .collect(),
            Err(_) => {
                warn!("subscription cache poisoned, stopping fanout");
                break;
            }
        };

        for (id, url) in targets {
            match deliverer.deliver(&url, &event) {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(subscription = %id, stream_id = %event.stream_id, version = event.version, "event delivered");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(subscription = %id, stream_id = %event.stream_id, version = event.version, error = %e, "event delivery failed");
                }
            }
        }
    }

    info!("fanout stopped");
}
