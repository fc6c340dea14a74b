//! Stream records and purge progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::StreamId;

/// An append-only stream as tracked by the store.
///
/// `version` is the version of the last stored event (0 once the first event
/// is written). A deleted stream keeps its history until purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub purging: bool,
    #[serde(default)]
    pub purged: bool,
}

impl Stream {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            version: 0,
            deleted: false,
            purging: false,
            purged: false,
        }
    }

    /// Whether new events may be appended.
    pub fn is_writable(&self) -> bool {
        !self.deleted && !self.purging && !self.purged
    }
}

/// Progress of a purge: `current` events removed out of `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeStatus {
    pub stream_id: StreamId,
    pub current: u64,
    pub total: u64,
}

impl PurgeStatus {
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}
