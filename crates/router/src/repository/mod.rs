//! Storage boundary for host records and sticky assignments.

use std::sync::Arc;

use evstore_core::StreamId;

use crate::error::RouterResult;
use crate::host::Host;

pub mod in_memory;

pub use in_memory::InMemoryRouterRepository;

/// Reads and writes available inside a router transaction.
pub trait RouterTx {
    fn host(&self, id: &str) -> Option<Host>;

    fn hosts(&self) -> Vec<Host>;

    fn put_host(&mut self, host: Host);

    fn remove_host(&mut self, id: &str) -> Option<Host>;

    /// Host id a stream is assigned to.
    fn assignment(&self, stream: &StreamId) -> Option<String>;

    fn put_assignment(&mut self, stream: StreamId, host_id: String);

    /// Drop every assignment pointing at `host_id`; returns how many.
    fn remove_assignments_for(&mut self, host_id: &str) -> usize;
}

/// Transactional home of the routing table.
///
/// `transaction` runs `f` as one read-modify-write: either every write made
/// through the [`RouterTx`] is kept (when `f` returns `Ok`) or none is.
pub trait RouterRepository: Send + Sync {
    fn transaction<T, F>(&self, f: F) -> RouterResult<T>
    where
        F: FnOnce(&mut dyn RouterTx) -> RouterResult<T>;
}

impl<R> RouterRepository for Arc<R>
where
    R: RouterRepository + ?Sized,
{
    fn transaction<T, F>(&self, f: F) -> RouterResult<T>
    where
        F: FnOnce(&mut dyn RouterTx) -> RouterResult<T>,
    {
        (**self).transaction(f)
    }
}
