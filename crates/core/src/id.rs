//! Strongly-typed identifiers used across the store.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum length of a stream identifier.
pub const MAX_STREAM_ID_LEN: usize = 150;

/// Separator between the shard prefix and the references of a stream id.
pub const SHARD_SEP: char = '|';

/// Separator between the references of a stream id.
pub const REF_SEP: char = '-';

const RESERVED: char = '$';

/// Identifier of an append-only stream.
///
/// Layout: `(shard)|(ref1)-(ref2)-...-(refN)`, shard prefix optional,
/// e.g. `ny3|campaign_tracking-1231230912901` or `orders-42`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

/// Identifier of a stored event (client-supplied or generated).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

macro_rules! impl_string_newtype {
    ($t:ident, $name:literal, $check:expr) => {
        impl $t {
            /// Build an identifier, validating its shape.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                let check: fn(&str) -> Result<(), String> = $check;
                check(&value).map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $t {
            type Error = DomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_newtype!(StreamId, "StreamId", |s| {
    if s.is_empty() {
        return Err("empty".to_string());
    }
    if s.len() > MAX_STREAM_ID_LEN {
        return Err(format!("longer than {MAX_STREAM_ID_LEN} characters"));
    }
    Ok(())
});

impl_string_newtype!(EventId, "EventId", |s| {
    if s.is_empty() {
        return Err("empty".to_string());
    }
    Ok(())
});

impl StreamId {
    /// Compose a stream id from an optional shard prefix and references.
    ///
    /// Shard ids must not contain `|` or `$`; references must not contain
    /// `-` or `$`.
    pub fn compose(shard: &str, refs: &[&str]) -> Result<Self, DomainError> {
        if shard.contains(RESERVED) || shard.contains(SHARD_SEP) {
            return Err(DomainError::invalid_id(format!("StreamId: invalid shard '{shard}'")));
        }
        if let Some(bad) = refs
            .iter()
            .find(|r| r.contains(REF_SEP) || r.contains(RESERVED))
        {
            return Err(DomainError::invalid_id(format!("StreamId: invalid reference '{bad}'")));
        }

        let joined = refs.join(&REF_SEP.to_string());
        if shard.is_empty() {
            Self::new(joined)
        } else {
            Self::new(format!("{shard}{SHARD_SEP}{joined}"))
        }
    }

    /// Stream id for an entity instance (`<entity>-<id>`).
    pub fn for_entity(entity: &str, id: &str) -> Result<Self, DomainError> {
        Self::new(format!("{entity}{REF_SEP}{id}"))
    }

    /// Shard prefix, if the id carries one.
    pub fn shard(&self) -> Option<&str> {
        self.0.split_once(SHARD_SEP).map(|(shard, _)| shard)
    }

    /// Reference part of the id (everything after the shard prefix).
    pub fn refs(&self) -> &str {
        match self.0.split_once(SHARD_SEP) {
            Some((_, refs)) => refs,
            None => &self.0,
        }
    }
}

impl EventId {
    /// Generate a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

/// Generate an opaque entity identifier (UUIDv7, simple form).
pub fn new_entity_id() -> String {
    Uuid::now_v7().simple().to_string()
}
