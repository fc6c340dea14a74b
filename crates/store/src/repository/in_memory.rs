use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use evstore_core::{Appended, Event, EventId, EventPackage, PurgeStatus, Stream, StreamId};

use super::EventRepository;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    streams: HashMap<StreamId, Stream>,
    events: HashMap<StreamId, BTreeMap<u64, Event>>,
    index: HashMap<EventId, (StreamId, u64)>,
    purges: BTreeMap<StreamId, PurgeStatus>,
}

/// In-memory repository.
///
/// Intended for tests/dev and single-process use. One `RwLock` guards the
/// whole state, which makes multi-package commits trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    state: RwLock<State>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

impl EventRepository for InMemoryEventRepository {
    fn stream(&self, id: &StreamId) -> StoreResult<Option<Stream>> {
        Ok(self.read()?.streams.get(id).cloned())
    }

    fn streams(&self) -> StoreResult<Vec<Stream>> {
        let mut all: Vec<Stream> = self.read()?.streams.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn save_stream(&self, stream: &Stream) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .streams
            .get_mut(&stream.id)
            .ok_or_else(|| StoreError::StreamNotFound(stream.id.clone()))?;

        stored.deleted = stream.deleted;
        stored.purging = stream.purging;
        stored.purged = stream.purged;
        Ok(())
    }

    fn locate(&self, event_id: &EventId) -> StoreResult<Option<(StreamId, u64)>> {
        Ok(self.read()?.index.get(event_id).cloned())
    }

    fn event(&self, stream: &StreamId, version: u64) -> StoreResult<Option<Event>> {
        Ok(self
            .read()?
            .events
            .get(stream)
            .and_then(|evs| evs.get(&version))
            .cloned())
    }

    fn events(&self, stream: &StreamId, from: u64, to: u64, limit: usize) -> StoreResult<Vec<Event>> {
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        Ok(state
            .events
            .get(stream)
            .map(|evs| evs.range(from..=to).take(limit).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default())
    }

    fn commit(&self, packages: &[EventPackage]) -> StoreResult<()> {
        let mut state = self.write()?;

        // Validate everything before touching state.
        for pkg in packages {
            pkg.validate()?;

            let first = pkg.events[0].version;
            let stored = state.streams.get(&pkg.stream.id).map(|s| s.version);
            let continues = match stored {
                Some(v) => first == v + 1,
                None => first == 0,
            };
            if !continues {
                return Err(StoreError::Concurrency {
                    stream_id: pkg.stream.id.clone(),
                    expected: first.saturating_sub(1),
                    actual: stored.unwrap_or(0),
                });
            }

            for e in &pkg.events {
                if let Some((_, version)) = state.index.get(&e.id) {
                    return Err(StoreError::Duplicate(Appended {
                        event_id: e.id.clone(),
                        version: *version,
                    }));
                }
            }
        }

        for pkg in packages {
            let stream = state
                .streams
                .entry(pkg.stream.id.clone())
                .or_insert_with(|| pkg.stream.clone());
            stream.version = pkg.stream.version;

            for e in &pkg.events {
                state
                    .index
                    .insert(e.id.clone(), (e.stream_id.clone(), e.version));
                state
                    .events
                    .entry(e.stream_id.clone())
                    .or_default()
                    .insert(e.version, e.clone());
            }
        }

        Ok(())
    }

    fn remove_events(&self, stream: &StreamId, limit: u64) -> StoreResult<u64> {
        let mut state = self.write()?;
        let State { events, index, .. } = &mut *state;

        let Some(evs) = events.get_mut(stream) else {
            return Ok(0);
        };

        let mut removed = 0;
        while removed < limit {
            let Some((_, e)) = evs.pop_first() else {
                break;
            };
            index.remove(&e.id);
            removed += 1;
        }

        if evs.is_empty() {
            events.remove(stream);
        }
        Ok(removed)
    }

    fn save_purge(&self, status: &PurgeStatus) -> StoreResult<()> {
        self.write()?
            .purges
            .insert(status.stream_id.clone(), status.clone());
        Ok(())
    }

    fn remove_purge(&self, stream: &StreamId) -> StoreResult<()> {
        self.write()?.purges.remove(stream);
        Ok(())
    }

    fn purges(&self) -> StoreResult<Vec<PurgeStatus>> {
        Ok(self.read()?.purges.values().cloned().collect())
    }
}
