//! Sticky, load-balanced assignment of streams to store instances.

use chrono::Utc;
use evstore_core::StreamId;
use evstore_events::StripedLocks;
use tracing::{info, instrument};

use crate::error::{RouterError, RouterResult};
use crate::host::{Host, HostRegistration};
use crate::repository::RouterRepository;

/// Routes streams to hosts.
///
/// A stream is assigned once and stays on its host. New streams go to the
/// open host with the fewest assignments, ties broken by ascending host id,
/// so open hosts never differ by more than one assignment when no host is
/// closed or removed in between.
///
/// Every call is one repository transaction; assignment calls are serialized
/// per stream id. A transaction only pays for the rows it touches.
#[derive(Debug)]
pub struct ShardRouter<R> {
    repo: R,
    locks: StripedLocks,
}

impl<R> ShardRouter<R>
where
    R: RouterRepository,
{
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            locks: StripedLocks::default(),
        }
    }

    /// Upsert a host and refresh its URL, closed flag and last-seen time.
    #[instrument(skip(self, reg), fields(host_id = %reg.id, closed = reg.closed), err)]
    pub fn register_host(&self, reg: HostRegistration) -> RouterResult<Host> {
        reg.validate()?;
        let now = Utc::now();

        self.repo.transaction(|tx| {
            let host = match tx.host(&reg.id) {
                Some(mut existing) => {
                    existing.refresh(&reg, now);
                    existing
                }
                None => {
                    info!("host registered");
                    Host::from_registration(&reg, now)
                }
            };
            tx.put_host(host.clone());
            Ok(host)
        })
    }

    /// Host owning `stream`, assigning one if the stream is new.
    #[instrument(skip(self), fields(stream_id = %stream), err)]
    pub fn assign_stream(&self, stream: &StreamId) -> RouterResult<Host> {
        let _guard = self.locks.lock(stream)?;

        self.repo.transaction(|tx| {
            if let Some(host_id) = tx.assignment(stream) {
                return tx
                    .host(&host_id)
                    .ok_or(RouterError::HostNotRegistered(host_id));
            }

            let mut chosen = tx
                .hosts()
                .into_iter()
                .filter(|h| !h.closed)
                .min_by(|a, b| a.streams.cmp(&b.streams).then_with(|| a.id.cmp(&b.id)))
                .ok_or(RouterError::NoAvailableHost)?;

            chosen.streams += 1;
            tx.put_host(chosen.clone());
            tx.put_assignment(stream.clone(), chosen.id.clone());
            Ok(chosen)
        })
    }

    /// Existing assignment of `stream`, without creating one.
    pub fn lookup(&self, stream: &StreamId) -> RouterResult<Option<Host>> {
        self.repo.transaction(|tx| match tx.assignment(stream) {
            None => Ok(None),
            Some(host_id) => tx
                .host(&host_id)
                .map(Some)
                .ok_or(RouterError::HostNotRegistered(host_id)),
        })
    }

    /// Drop a host together with its assignments, so those streams get
    /// reassigned on their next lookup.
    #[instrument(skip(self), err)]
    pub fn remove_host(&self, host_id: &str) -> RouterResult<Host> {
        self.repo.transaction(|tx| {
            let host = tx
                .remove_host(host_id)
                .ok_or_else(|| RouterError::HostNotFound(host_id.to_string()))?;
            let dropped = tx.remove_assignments_for(host_id);
            info!(dropped, "host removed");
            Ok(host)
        })
    }

    pub fn hosts(&self) -> RouterResult<Vec<Host>> {
        self.repo.transaction(|tx| Ok(tx.hosts()))
    }
}
