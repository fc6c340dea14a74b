use std::sync::Arc;
use std::thread;
use std::time::Duration;

use evstore_core::{AppendOptions, Appended, EventId, NewEvent, Payload, Settings, StreamId};
use evstore_events::{EventBus, InMemoryEventBus};
use proptest::prelude::*;
use regex::Regex;
use serde_json::json;

use crate::{InMemoryEventRepository, PurgeWorker, StoreError, StreamStore};

fn test_store() -> StreamStore<InMemoryEventRepository> {
    StreamStore::new(InMemoryEventRepository::new())
}

fn sid(s: &str) -> StreamId {
    StreamId::new(s).unwrap()
}

fn new_event(stream: &str, event_type: &str) -> NewEvent {
    let payload: Payload = json!({"n": 1}).as_object().cloned().unwrap_or_default();
    NewEvent::new(sid(stream), event_type, payload)
}

fn versions(store: &StreamStore<InMemoryEventRepository>, stream: &str) -> Vec<u64> {
    let (cursor, _) = store.range(&sid(stream)).unwrap();
    cursor.map(|e| e.unwrap().version).collect()
}

#[test]
fn first_append_creates_stream_at_version_zero() {
    let store = test_store();

    let out = store
        .append(new_event("orders-1", "OrderCreated"), AppendOptions::create())
        .unwrap();
    assert_eq!(out.version, 0);
    assert_eq!(store.version(&sid("orders-1")).unwrap(), 0);

    let again = store
        .append(new_event("orders-1", "OrderCreated"), AppendOptions::create())
        .unwrap_err();
    assert_eq!(again, StoreError::AlreadyExists(sid("orders-1")));
}

#[test]
fn unlocked_append_creates_implicitly_and_increments() {
    let store = test_store();
    for expected in 0..3 {
        let out = store
            .append(new_event("orders-1", "OrderUpdated"), AppendOptions::default())
            .unwrap();
        assert_eq!(out.version, expected);
    }
    assert_eq!(versions(&store, "orders-1"), vec![0, 1, 2]);
}

#[test]
fn duplicate_event_id_returns_original_outcome() {
    let store = test_store();
    let id = EventId::new("evt-1").unwrap();

    let first = store
        .append(new_event("orders-1", "OrderCreated").with_id(id.clone()), AppendOptions::default())
        .unwrap();
    store
        .append(new_event("orders-1", "OrderUpdated"), AppendOptions::default())
        .unwrap();

    let err = store
        .append(new_event("orders-1", "OrderCreated").with_id(id.clone()), AppendOptions::default())
        .unwrap_err();
    assert_eq!(err, StoreError::Duplicate(first));
    assert_eq!(store.version(&sid("orders-1")).unwrap(), 1);
}

#[test]
fn lock_mismatch_leaves_stream_untouched() {
    let store = test_store();
    for _ in 0..4 {
        store
            .append(new_event("orders-7", "OrderUpdated"), AppendOptions::default())
            .unwrap();
    }
    assert_eq!(store.version(&sid("orders-7")).unwrap(), 3);

    let err = store
        .append(new_event("orders-7", "OrderUpdated"), AppendOptions::locked(2))
        .unwrap_err();
    assert!(matches!(err, StoreError::Concurrency { expected: 2, actual: 3, .. }));
    assert_eq!(store.version(&sid("orders-7")).unwrap(), 3);
    assert_eq!(versions(&store, "orders-7").len(), 4);

    let ok = store
        .append(new_event("orders-7", "OrderUpdated"), AppendOptions::locked(3))
        .unwrap();
    assert_eq!(ok.version, 4);
}

#[test]
fn locked_append_to_missing_stream_is_not_found() {
    let store = test_store();
    let err = store
        .append(new_event("orders-9", "OrderUpdated"), AppendOptions::locked(0))
        .unwrap_err();
    assert_eq!(err, StoreError::StreamNotFound(sid("orders-9")));
    assert!(store.version(&sid("orders-9")).is_err());
}

#[test]
fn empty_event_type_is_rejected() {
    let store = test_store();
    let err = store
        .append(new_event("orders-1", ""), AppendOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.streams().unwrap().is_empty());
}

#[test]
fn linked_streams_receive_link_events_in_same_commit() {
    let store = test_store();
    store
        .append(new_event("app_log", "Seed"), AppendOptions::default())
        .unwrap();

    let out = store
        .append(
            new_event("orders-1", "OrderCreated").with_links([sid("app_log"), sid("audit-1")]),
            AppendOptions::default(),
        )
        .unwrap();

    let link = store.read(&sid("app_log"), 1).unwrap();
    assert!(link.payload.is_empty());
    assert_eq!(link.event_type, "OrderCreated");
    let marker = link.link.unwrap();
    assert_eq!(marker.stream_id, sid("orders-1"));
    assert_eq!(marker.version, out.version);

    assert_eq!(store.version(&sid("audit-1")).unwrap(), 0);
}

#[test]
fn deleted_streams_reject_appends_and_are_skipped_as_links() {
    let store = test_store();
    store
        .append(new_event("audit-1", "Seed"), AppendOptions::default())
        .unwrap();
    store.delete(&sid("audit-1")).unwrap();

    let err = store
        .append(new_event("audit-1", "More"), AppendOptions::default())
        .unwrap_err();
    assert_eq!(err, StoreError::StreamDeleted(sid("audit-1")));

    for opts in [AppendOptions::create(), AppendOptions::locked(0)] {
        let err = store.append(new_event("audit-1", "More"), opts).unwrap_err();
        assert_eq!(err, StoreError::StreamDeleted(sid("audit-1")));
    }

    store
        .append(
            new_event("orders-1", "OrderCreated").with_links([sid("audit-1")]),
            AppendOptions::default(),
        )
        .unwrap();
    assert_eq!(store.version(&sid("audit-1")).unwrap(), 0);
}

#[test]
fn scan_is_inclusive_and_validates_range() {
    let store = test_store();
    for _ in 0..250 {
        store
            .append(new_event("orders-1", "Tick"), AppendOptions::default())
            .unwrap();
    }

    let got: Vec<u64> = store
        .scan(&sid("orders-1"), 95, 205)
        .unwrap()
        .map(|e| e.unwrap().version)
        .collect();
    assert_eq!(got, (95..=205).collect::<Vec<_>>());

    assert_eq!(
        store.scan(&sid("orders-1"), 5, 4).unwrap_err(),
        StoreError::InvalidRange { from: 5, to: 4 }
    );
    assert!(matches!(
        store.scan(&sid("nope-1"), 0, 4).unwrap_err(),
        StoreError::StreamNotFound(_)
    ));

    let (cursor, version) = store.range(&sid("orders-1")).unwrap();
    assert_eq!(version, 249);
    assert_eq!(cursor.count(), 250);
}

#[test]
fn streams_matching_filters_by_regex() {
    let store = test_store();
    for s in ["orders-1", "orders-2", "users-1"] {
        store.append(new_event(s, "Tick"), AppendOptions::default()).unwrap();
    }

    let re = Regex::new("^orders-").unwrap();
    let ids: Vec<String> = store
        .streams_matching(&re)
        .unwrap()
        .into_iter()
        .map(|s| s.id.into_inner())
        .collect();
    assert_eq!(ids, vec!["orders-1".to_string(), "orders-2".to_string()]);
}

#[test]
fn purge_requires_delete_and_runs_in_batches() {
    let store = test_store();
    for _ in 0..5 {
        store
            .append(new_event("orders-1", "Tick"), AppendOptions::default())
            .unwrap();
    }

    assert!(matches!(
        store.purge(&sid("orders-1")).unwrap_err(),
        StoreError::Validation(_)
    ));

    store.delete(&sid("orders-1")).unwrap();
    let status = store.purge(&sid("orders-1")).unwrap();
    assert_eq!((status.current, status.total), (0, 5));

    assert_eq!(store.purge_step(2).unwrap(), 0);
    assert_eq!(store.purge_statuses().unwrap()[0].current, 2);

    assert_eq!(store.purge_step(2).unwrap(), 0);
    assert_eq!(store.purge_step(2).unwrap(), 1);
    assert!(store.purge_statuses().unwrap().is_empty());

    let stream = store.stream(&sid("orders-1")).unwrap();
    assert!(stream.purged && !stream.purging);
    assert_eq!(versions(&store, "orders-1"), Vec::<u64>::new());
}

#[test]
fn purge_worker_completes_pending_purges() {
    let store = Arc::new(test_store());
    store
        .append(new_event("orders-1", "Tick"), AppendOptions::default())
        .unwrap();
    store.delete(&sid("orders-1")).unwrap();
    store.purge(&sid("orders-1")).unwrap();

    let worker = PurgeWorker::spawn_with(store.clone(), Duration::from_millis(10), 100);
    for _ in 0..50 {
        if store.purge_statuses().unwrap().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    worker.shutdown();

    assert!(store.stream(&sid("orders-1")).unwrap().purged);
}

#[test]
fn appended_events_are_published() {
    let bus: Arc<InMemoryEventBus<evstore_core::Event>> = Arc::new(InMemoryEventBus::new());
    let sub = bus.subscribe();
    let store = StreamStore::with_settings(InMemoryEventRepository::new(), &Settings::default())
        .with_publisher(bus.clone());

    let out = store
        .append(new_event("orders-42", "OrderCreated"), AppendOptions::default())
        .unwrap();

    let published = sub.recv_timeout(Duration::from_millis(200)).unwrap();
    assert_eq!(published.id, out.event_id);
    assert_eq!(published.version, 0);
}

#[test]
fn concurrent_appends_keep_versions_contiguous() {
    let store = Arc::new(test_store());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    store
                        .append(new_event("orders-1", "Tick"), AppendOptions::default())
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(versions(&store, "orders-1"), (0..200).collect::<Vec<_>>());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Any interleaving of appends over a few streams yields versions 0..n per stream.
    #[test]
    fn versions_are_contiguous_from_zero(targets in prop::collection::vec(0usize..3, 1..40)) {
        let store = test_store();
        let names = ["a-1", "b-1", "c-1"];
        let mut outcomes: Vec<Vec<Appended>> = vec![Vec::new(); names.len()];

        for t in &targets {
            let out = store.append(new_event(names[*t], "Tick"), AppendOptions::default()).unwrap();
            outcomes[*t].push(out);
        }

        for (i, name) in names.iter().enumerate() {
            let expected: Vec<u64> = (0..outcomes[i].len() as u64).collect();
            let returned: Vec<u64> = outcomes[i].iter().map(|o| o.version).collect();
            prop_assert_eq!(&returned, &expected);
            if !expected.is_empty() {
                prop_assert_eq!(versions(&store, name), expected);
            }
        }
    }
}
