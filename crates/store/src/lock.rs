//! Append preconditions.

use evstore_core::{AppendOptions, StreamId};

use crate::error::{StoreError, StoreResult};

/// Decides whether an append may proceed given the stream's current version.
///
/// Pure: no IO, no locking. `current` is `None` when the stream does not exist.
///
/// | stream  | create | lock | outcome                              |
/// |---------|--------|------|--------------------------------------|
/// | exists  | true   | any  | `AlreadyExists`                      |
/// | exists  | false  | true | `Concurrency` unless versions match  |
/// | absent  | false  | true | `StreamNotFound`                     |
/// | absent  | any    | false| ok (created implicitly)              |
/// | absent  | true   | true | ok                                   |
#[derive(Debug, Copy, Clone, Default)]
pub struct LockCoordinator;

impl LockCoordinator {
    pub fn check(stream_id: &StreamId, current: Option<u64>, opts: &AppendOptions) -> StoreResult<()> {
        match current {
            Some(_) if opts.create => Err(StoreError::AlreadyExists(stream_id.clone())),
            Some(actual) if !opts.expected().matches(actual) => Err(StoreError::Concurrency {
                stream_id: stream_id.clone(),
                expected: opts.expected_version,
                actual,
            }),
            Some(_) => Ok(()),
            None if opts.lock && !opts.create => Err(StoreError::StreamNotFound(stream_id.clone())),
            None => Ok(()),
        }
    }
}
