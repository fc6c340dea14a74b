//! Base field whitelists.

use std::collections::BTreeMap;

use evstore_core::Payload;

use crate::error::{CqrsError, CqrsResult};

/// Declared set of fields an entity's base events may carry.
///
/// A field can be known under several names; every alias resolves to its
/// canonical field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseSchema {
    names: BTreeMap<String, String>,
}

impl BaseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.names.insert(name.clone(), name);
        self
    }

    pub fn fields<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |s, n| s.field(n))
    }

    pub fn alias(mut self, alias: impl Into<String>, field: impl Into<String>) -> Self {
        self.names.insert(alias.into(), field.into());
        self
    }

    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    /// Reject the first payload field the schema does not know.
    pub fn check(&self, payload: &Payload) -> CqrsResult<()> {
        match payload.keys().find(|k| !self.names.contains_key(k.as_str())) {
            Some(unknown) => Err(CqrsError::UnknownField(unknown.clone())),
            None => Ok(()),
        }
    }
}
