//! Events, link markers and commit packages.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{DomainError, DomainResult};
use crate::id::{EventId, StreamId};
use crate::stream::Stream;

/// Schema-free event payload (field name -> JSON value).
pub type Payload = serde_json::Map<String, JsonValue>;

/// Correlation pointer carried by a link event: the origin stream and the
/// version the origin event was stored at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMarker {
    pub stream_id: StreamId,
    pub version: u64,
}

/// An event submitted for append (no version assigned yet).
///
/// The id is optional: the store generates one when absent. Re-submitting
/// an id that was already stored is detected and answered with the
/// original outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    pub stream_id: StreamId,
    pub event_type: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_streams: Vec<StreamId>,
}

impl NewEvent {
    pub fn new(stream_id: StreamId, event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: None,
            stream_id,
            event_type: event_type.into(),
            payload,
            linked_streams: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = StreamId>) -> Self {
        self.linked_streams.extend(links);
        self
    }

    /// Validate the event and return its definitive id (generated if absent).
    pub fn validate(&self) -> DomainResult<EventId> {
        if self.event_type.trim().is_empty() {
            return Err(DomainError::validation("invalid event type"));
        }
        Ok(self.id.clone().unwrap_or_else(EventId::generate))
    }
}

/// An event stored in a stream (immutable, version assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub stream_id: StreamId,
    pub event_type: String,

    /// Position in the stream; the first event of a stream has version 0.
    pub version: u64,

    #[serde(default)]
    pub payload: Payload,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_streams: Vec<StreamId>,

    /// Present only on link events written into secondary streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkMarker>,

    pub recorded_at: DateTime<Utc>,
}

impl Event {
    /// Materialize a validated submission at its assigned version.
    pub fn stored(id: EventId, new: NewEvent, version: u64) -> Self {
        Self {
            id,
            stream_id: new.stream_id,
            event_type: new.event_type,
            version,
            payload: new.payload,
            linked_streams: new.linked_streams,
            link: None,
            recorded_at: Utc::now(),
        }
    }

    /// Build a link event for `stream_id` at `version` pointing back to `origin`.
    ///
    /// Carries the origin event type but not its payload.
    pub fn link_to(origin: &Event, stream_id: StreamId, version: u64) -> Self {
        Self {
            id: EventId::generate(),
            stream_id,
            event_type: origin.event_type.clone(),
            version,
            payload: Payload::new(),
            linked_streams: Vec::new(),
            link: Some(LinkMarker {
                stream_id: origin.stream_id.clone(),
                version: origin.version,
            }),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_link(&self) -> bool {
        self.link.is_some()
    }

    /// Decode the payload into a typed structure.
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(JsonValue::Object(self.payload.clone()))
            .map_err(|e| DomainError::validation(format!("payload decode failed: {e}")))
    }
}

/// A stream plus an ordered, version-contiguous batch committed atomically.
///
/// `stream` carries the stream record as it must look after the commit, so
/// the last event's version equals `stream.version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPackage {
    pub stream: Stream,
    pub events: Vec<Event>,
}

impl EventPackage {
    pub fn new(stream: Stream, events: Vec<Event>) -> Self {
        Self { stream, events }
    }

    /// Check the package invariants: non-empty, append point matches the
    /// stream version, versions contiguous, every event targets the stream.
    pub fn validate(&self) -> DomainResult<()> {
        let last = self
            .events
            .last()
            .ok_or_else(|| DomainError::invariant("empty event package"))?;

        if last.version != self.stream.version {
            return Err(DomainError::invariant(format!(
                "stream '{}' is at version {} but package ends at {}",
                self.stream.id, self.stream.version, last.version
            )));
        }

        for (idx, pair) in self.events.windows(2).enumerate() {
            if pair[1].version != pair[0].version + 1 {
                return Err(DomainError::invariant(format!(
                    "non-contiguous versions in package (index {})",
                    idx + 1
                )));
            }
        }

        if let Some(e) = self.events.iter().find(|e| e.stream_id != self.stream.id) {
            return Err(DomainError::invariant(format!(
                "event {} targets stream '{}' inside package for '{}'",
                e.id, e.stream_id, self.stream.id
            )));
        }

        Ok(())
    }
}
