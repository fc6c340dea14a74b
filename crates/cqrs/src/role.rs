//! Role based command authorization.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Decides whether a role may emit an event type.
pub trait Authorizer: Send + Sync {
    fn can(&self, role: &str, event_type: &str) -> bool;
}

impl<A> Authorizer for Arc<A>
where
    A: Authorizer + ?Sized,
{
    fn can(&self, role: &str, event_type: &str) -> bool {
        (**self).can(role, event_type)
    }
}

/// Allow-list (empty means every event type) with a deny-list that wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub allowed: BTreeSet<String>,
    #[serde(default)]
    pub denied: BTreeSet<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn allow(mut self, event_type: impl Into<String>) -> Self {
        self.allowed.insert(event_type.into());
        self
    }

    pub fn deny(mut self, event_type: impl Into<String>) -> Self {
        self.denied.insert(event_type.into());
        self
    }

    pub fn can(&self, event_type: &str) -> bool {
        if self.denied.contains(event_type) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.contains(event_type)
    }
}

/// Roles by name. Unknown roles may do nothing.
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    roles: HashMap<String, Role>,
}

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }
}

impl Authorizer for RoleSet {
    fn can(&self, role: &str, event_type: &str) -> bool {
        self.roles.get(role).is_some_and(|r| r.can(event_type))
    }
}
