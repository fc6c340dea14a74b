use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use evstore_core::StreamId;

use super::{RouterRepository, RouterTx};
use crate::error::{RouterError, RouterResult};
use crate::host::Host;

#[derive(Debug, Default)]
struct Table {
    hosts: BTreeMap<String, Host>,
    assignments: HashMap<StreamId, String>,
}

/// Writes staged by one transaction.
///
/// `None` entries are removals. `cleared` holds hosts whose committed
/// assignments were dropped wholesale.
#[derive(Debug, Default)]
struct Writes {
    hosts: BTreeMap<String, Option<Host>>,
    assignments: HashMap<StreamId, Option<String>>,
    cleared: BTreeSet<String>,
}

impl Writes {
    fn apply(self, table: &mut Table) {
        if !self.cleared.is_empty() {
            table.assignments.retain(|_, h| !self.cleared.contains(h));
        }
        for (id, host) in self.hosts {
            match host {
                Some(host) => table.hosts.insert(id, host),
                None => table.hosts.remove(&id),
            };
        }
        for (stream, host_id) in self.assignments {
            match host_id {
                Some(host_id) => table.assignments.insert(stream, host_id),
                None => table.assignments.remove(&stream),
            };
        }
    }
}

/// Committed table seen through the staged writes.
struct Draft<'a> {
    base: &'a Table,
    writes: Writes,
}

impl RouterTx for Draft<'_> {
    fn host(&self, id: &str) -> Option<Host> {
        match self.writes.hosts.get(id) {
            Some(staged) => staged.clone(),
            None => self.base.hosts.get(id).cloned(),
        }
    }

    fn hosts(&self) -> Vec<Host> {
        let mut all: BTreeMap<&str, &Host> = self
            .base
            .hosts
            .iter()
            .map(|(id, h)| (id.as_str(), h))
            .collect();
        for (id, staged) in &self.writes.hosts {
            match staged {
                Some(h) => all.insert(id.as_str(), h),
                None => all.remove(id.as_str()),
            };
        }
        all.into_values().cloned().collect()
    }

    fn put_host(&mut self, host: Host) {
        self.writes.hosts.insert(host.id.clone(), Some(host));
    }

    fn remove_host(&mut self, id: &str) -> Option<Host> {
        let prev = self.host(id);
        self.writes.hosts.insert(id.to_string(), None);
        prev
    }

    fn assignment(&self, stream: &StreamId) -> Option<String> {
        match self.writes.assignments.get(stream) {
            Some(staged) => staged.clone(),
            None => self
                .base
                .assignments
                .get(stream)
                .filter(|h| !self.writes.cleared.contains(*h))
                .cloned(),
        }
    }

    fn put_assignment(&mut self, stream: StreamId, host_id: String) {
        self.writes.assignments.insert(stream, Some(host_id));
    }

    fn remove_assignments_for(&mut self, host_id: &str) -> usize {
        let mut dropped = 0;
        if !self.writes.cleared.contains(host_id) {
            dropped += self
                .base
                .assignments
                .iter()
                .filter(|(s, h)| h.as_str() == host_id && !self.writes.assignments.contains_key(*s))
                .count();
            self.writes.cleared.insert(host_id.to_string());
        }
        for staged in self.writes.assignments.values_mut() {
            if staged.as_deref() == Some(host_id) {
                *staged = None;
                dropped += 1;
            }
        }
        dropped
    }
}

/// In-memory routing table.
///
/// A transaction stages its writes and applies them to the table only on
/// success, so its cost follows what it touches rather than the table size.
#[derive(Debug, Default)]
pub struct InMemoryRouterRepository {
    table: Mutex<Table>,
}

impl InMemoryRouterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RouterRepository for InMemoryRouterRepository {
    fn transaction<T, F>(&self, f: F) -> RouterResult<T>
    where
        F: FnOnce(&mut dyn RouterTx) -> RouterResult<T>,
    {
        let mut table = self
            .table
            .lock()
            .map_err(|_| RouterError::Backend("lock poisoned".to_string()))?;

        let mut draft = Draft {
            base: &table,
            writes: Writes::default(),
        };
        let out = f(&mut draft)?;
        let writes = draft.writes;
        writes.apply(&mut table);
        Ok(out)
    }
}
