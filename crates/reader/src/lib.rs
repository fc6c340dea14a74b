//! `evstore-reader`: keeping read models in step with the store.
//!
//! [`ReaderClient`] follows a push feed of appended events and repairs gaps
//! with range reads; [`ViewRunner`] polls a single stream for views that
//! prefer pull.

pub mod client;
pub mod error;
pub mod feed;
pub mod source;
pub mod view;

pub use client::{ReaderClient, ReaderOptions, ReaderState};
pub use error::{ReaderError, ReaderResult};
pub use feed::ReaderFeed;
pub use source::{Events, RangeSource};
pub use view::{RunMode, ViewConfig, ViewProgress, ViewRunner, poll_once};
