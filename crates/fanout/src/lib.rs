//! `evstore-fanout`: pushes appended events to webhook subscribers.

pub mod deliver;
pub mod error;
pub mod fanout;
pub mod repository;
pub mod subscription;

pub use deliver::{Deliverer, HttpDeliverer};
pub use error::{DeliveryError, FanoutError, FanoutResult};
pub use fanout::{FanoutCounts, FanoutStats, PubFanout};
pub use repository::{InMemorySubscriptionRepository, SubscriptionRepository};
pub use subscription::{CompiledWebhook, Webhook};
