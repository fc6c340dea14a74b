//! Event publishing/subscription abstraction (mechanics only).
//!
//! The store hands every committed event to its publishers after the commit
//! succeeds. Publishers are best-effort: the stream is the source of truth and
//! a consumer that missed a message catches up with a range read.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Internal lock poisoned by a panicking thread.
    #[error("publisher state poisoned")]
    Poisoned,

    /// A bounded queue was full and the message was dropped.
    #[error("queue full, message dropped")]
    QueueFull,

    /// The consuming side has shut down.
    #[error("publisher closed")]
    Closed,
}

/// A subscription to a bus.
///
/// Each subscription receives its own copy of every message published after it
/// was created (broadcast semantics). Meant for consumption by a single thread:
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(event) => process(event)?,
///         Err(RecvTimeoutError::Timeout) => continue,
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Something that accepts messages after they are durably stored.
///
/// Implementations must not block the caller for long: the store calls
/// `publish` on its append path. Failures are reported but never undo the
/// append.
pub trait Publisher<M>: Send + Sync {
    fn publish(&self, message: M) -> Result<(), BusError>;
}

/// A publisher that also hands out subscriptions (pub/sub).
pub trait EventBus<M>: Publisher<M> {
    fn subscribe(&self) -> Subscription<M>;
}

impl<M, P> Publisher<M> for Arc<P>
where
    P: Publisher<M> + ?Sized,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        (**self).publish(message)
    }
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
