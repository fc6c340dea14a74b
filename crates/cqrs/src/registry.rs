//! Registered entity types.

use std::collections::BTreeMap;

use crate::conf::EntityConf;
use crate::error::{ConfigError, CqrsError, CqrsResult};

/// Entity types known to a command service, keyed by lowercased name.
///
/// Built once at startup; every configuration mistake is reported here.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<String, EntityConf>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, conf: EntityConf) -> Result<(), ConfigError> {
        conf.verify()?;
        if self.entities.contains_key(conf.name()) {
            return Err(ConfigError::DuplicateEntity(conf.name().to_string()));
        }
        self.entities.insert(conf.name().to_string(), conf);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, conf: EntityConf) -> Result<Self, ConfigError> {
        self.register(conf)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> CqrsResult<&EntityConf> {
        self.entities
            .get(&name.to_lowercase())
            .ok_or_else(|| CqrsError::UnknownEntity(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
