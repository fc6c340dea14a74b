//! Keyed write serialization without a global lock.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("stripe lock poisoned")]
pub struct LockPoisoned;

/// Fixed set of mutexes; a key always maps to the same stripe.
///
/// Work on different keys proceeds in parallel unless the keys collide on a
/// stripe. Multi-key work takes its stripes in ascending index order, so two
/// callers can never wait on each other in a cycle.
#[derive(Debug)]
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new(64)
    }
}

impl StripedLocks {
    pub fn new(stripes: usize) -> Self {
        let n = stripes.max(1);
        Self {
            stripes: (0..n).map(|_| Mutex::new(())).collect(),
        }
    }

    fn index<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        (h.finish() % self.stripes.len() as u64) as usize
    }

    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> Result<MutexGuard<'_, ()>, LockPoisoned> {
        self.stripes[self.index(key)].lock().map_err(|_| LockPoisoned)
    }

    /// Lock every stripe touched by `keys`.
    pub fn lock_all<'k, K, I>(&self, keys: I) -> Result<Vec<MutexGuard<'_, ()>>, LockPoisoned>
    where
        K: Hash + ?Sized + 'k,
        I: IntoIterator<Item = &'k K>,
    {
        let mut idx: Vec<usize> = keys.into_iter().map(|k| self.index(k)).collect();
        idx.sort_unstable();
        idx.dedup();

        idx.into_iter()
            .map(|i| self.stripes[i].lock().map_err(|_| LockPoisoned))
            .collect()
    }
}
