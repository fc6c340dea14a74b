//! Append preconditions and outcomes.

use serde::{Deserialize, Serialize};

use crate::id::EventId;

/// Optimistic concurrency expectation for a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}

/// Preconditions attached to an append.
///
/// - `create`: the append must create the stream (fails if it exists).
/// - `lock`: the stream must currently be at `expected_version`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOptions {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub expected_version: u64,
}

impl AppendOptions {
    /// Append that must create a new stream.
    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::default()
        }
    }

    /// Append guarded by an optimistic lock on `version`.
    pub fn locked(version: u64) -> Self {
        Self {
            lock: true,
            expected_version: version,
            ..Self::default()
        }
    }

    pub fn expected(&self) -> ExpectedVersion {
        if self.lock {
            ExpectedVersion::Exact(self.expected_version)
        } else {
            ExpectedVersion::Any
        }
    }
}

/// Outcome of a successful append: the stored event id and its version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Appended {
    pub event_id: EventId,
    pub version: u64,
}
