//! `evstore-store`: the append-only stream store.
//!
//! Versioning, optimistic locking, idempotent appends, link propagation and
//! paged reads on top of an abstract [`EventRepository`].

pub mod cursor;
pub mod error;
pub mod link;
pub mod lock;
pub mod purge;
pub mod repository;
pub mod store;

pub use cursor::EventCursor;
pub use error::{StoreError, StoreResult};
pub use link::LinkPropagator;
pub use lock::LockCoordinator;
pub use purge::PurgeWorker;
pub use repository::{EventRepository, InMemoryEventRepository};
pub use store::{ServerInfo, StreamStore};

#[cfg(test)]
mod tests;
