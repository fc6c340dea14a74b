//! Store instances known to the router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RouterError, RouterResult};

/// A host as announced by a store instance (periodic heartbeat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegistration {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub closed: bool,
}

impl HostRegistration {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            closed: false,
        }
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn validate(&self) -> RouterResult<()> {
        if self.id.trim().is_empty() {
            return Err(RouterError::Validation("empty host id".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(RouterError::Validation("empty host url".to_string()));
        }
        Url::parse(&self.url)
            .map_err(|e| RouterError::Validation(format!("bad url '{}': {e}", self.url)))?;
        Ok(())
    }
}

/// Router-side record of a host.
///
/// `streams` counts the sticky assignments pointing at this host. A closed
/// host keeps its existing streams but receives no new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub url: String,
    pub closed: bool,
    pub streams: u64,
    pub last_seen: DateTime<Utc>,
}

impl Host {
    pub fn from_registration(reg: &HostRegistration, now: DateTime<Utc>) -> Self {
        Self {
            id: reg.id.clone(),
            url: reg.url.clone(),
            closed: reg.closed,
            streams: 0,
            last_seen: now,
        }
    }

    /// Refresh announced fields; the stream count is router-owned.
    pub fn refresh(&mut self, reg: &HostRegistration, now: DateTime<Utc>) {
        self.url = reg.url.clone();
        self.closed = reg.closed;
        self.last_seen = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_validation() {
        assert!(HostRegistration::new("h1", "http://10.0.0.1:6060").validate().is_ok());
        assert!(HostRegistration::new("", "http://10.0.0.1:6060").validate().is_err());
        assert!(HostRegistration::new("h1", "").validate().is_err());
        assert!(HostRegistration::new("h1", "not a url").validate().is_err());
    }
}
