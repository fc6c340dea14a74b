//! `evstore-cqrs`: entities on top of the stream store.
//!
//! An entity type is a set of event handlers plus the constraints checked on
//! every live command (base schema, references, validators, roles). State is
//! never stored; it is rebuilt by replaying the entity's stream.

pub mod command;
pub mod conf;
pub mod crud;
pub mod error;
pub mod handler;
pub mod reference;
pub mod registry;
pub mod role;
pub mod schema;
pub mod service;
pub mod validate;

pub use command::{Actor, Command, CommandOutcome};
pub use conf::EntityConf;
pub use crud::CrudHandler;
pub use error::{ConfigError, CqrsError, CqrsResult};
pub use handler::{EventHandler, HandledEvent, HandlerContext, Mode};
pub use reference::{EntityLookup, RefShape, Reference};
pub use registry::EntityRegistry;
pub use role::{Authorizer, Role, RoleSet};
pub use schema::BaseSchema;
pub use service::CommandService;
pub use validate::{PropertyValidator, Rule, Validator};

#[cfg(test)]
mod integration_tests;
