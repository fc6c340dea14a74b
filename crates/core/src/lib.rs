//! `evstore-core`: data model shared by every evstore crate.
//!
//! Pure types only: identifiers, events, streams, packages, the entity
//! projection, error taxonomy and runtime settings. No IO besides reading
//! settings from the environment.

pub mod append;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod settings;
pub mod stream;

pub use append::{AppendOptions, Appended, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use event::{Event, EventPackage, LinkMarker, NewEvent, Payload};
pub use id::{EventId, StreamId, new_entity_id};
pub use settings::{Settings, SettingsError};
pub use stream::{PurgeStatus, Stream};
