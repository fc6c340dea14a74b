//! `evstore-router`: assigns streams to store instances.
//!
//! Store instances register (and re-register as a heartbeat) with the router;
//! clients ask the router which instance owns a stream before talking to it.

pub mod error;
pub mod host;
pub mod repository;
pub mod router;

pub use error::{RouterError, RouterResult};
pub use host::{Host, HostRegistration};
pub use repository::{InMemoryRouterRepository, RouterRepository, RouterTx};
pub use router::ShardRouter;
