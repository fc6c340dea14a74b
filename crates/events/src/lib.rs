//! `evstore-events`: event distribution and read-model mechanics.
//!
//! Transport-agnostic pub/sub plus the contracts read models implement.
//! Nothing here knows how events are stored.

pub mod bus;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;
pub mod stripes;
pub mod worker;

pub use bus::{BusError, EventBus, Publisher, Subscription};
pub use in_memory_bus::InMemoryEventBus;
pub use projection::{ApplyOutcome, ProjectionError, Projector, View};
pub use runner::{Step, VersionTracker};
pub use stripes::{LockPoisoned, StripedLocks};
pub use worker::WorkerHandle;
