//! Per-stream version tracking for projectors.
//!
//! Deterministic bookkeeping only; what "applying" means stays with the
//! read model.

use std::collections::HashMap;

use evstore_core::{Event, StreamId};

use crate::projection::ApplyOutcome;

/// What a projector should do with an incoming event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Apply,
    Skip,
    Gap { local: Option<u64> },
}

impl From<Step> for ApplyOutcome {
    fn from(step: Step) -> Self {
        match step {
            Step::Apply => ApplyOutcome::Applied,
            Step::Skip => ApplyOutcome::Skipped,
            Step::Gap { local } => ApplyOutcome::OutOfSync { local },
        }
    }
}

/// Tracks the last applied version of every stream a read model follows.
#[derive(Debug, Default, Clone)]
pub struct VersionTracker {
    versions: HashMap<StreamId, u64>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, stream: &StreamId) -> Option<u64> {
        self.versions.get(stream).copied()
    }

    /// Classify `event` against the tracked version of its stream.
    ///
    /// A stream starts at version 0, so the first acceptable event of an
    /// unknown stream is version 0.
    pub fn check(&self, event: &Event) -> Step {
        match self.version(&event.stream_id) {
            None if event.version == 0 => Step::Apply,
            None => Step::Gap { local: None },
            Some(v) if event.version <= v => Step::Skip,
            Some(v) if event.version == v + 1 => Step::Apply,
            Some(v) => Step::Gap { local: Some(v) },
        }
    }

    /// Record that `event` was applied.
    pub fn record(&mut self, event: &Event) {
        self.versions.insert(event.stream_id.clone(), event.version);
    }

    /// Check then record when applicable, running `apply` in between.
    pub fn advance<E>(
        &mut self,
        event: &Event,
        apply: impl FnOnce(&Event) -> Result<(), E>,
    ) -> Result<ApplyOutcome, E> {
        let step = self.check(event);
        if step == Step::Apply {
            apply(event)?;
            self.record(event);
        }
        Ok(step.into())
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }

    pub fn streams(&self) -> impl Iterator<Item = (&StreamId, u64)> {
        self.versions.iter().map(|(k, v)| (k, *v))
    }
}
