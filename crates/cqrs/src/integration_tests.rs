use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use evstore_core::{AppendOptions, Entity, Event, EventId, NewEvent, Payload, Settings, StreamId};
use evstore_events::{ApplyOutcome, ProjectionError, Projector, VersionTracker};
use evstore_fanout::{Deliverer, DeliveryError, InMemorySubscriptionRepository, PubFanout, Webhook};
use evstore_reader::{ReaderClient, ReaderFeed};
use evstore_store::{InMemoryEventRepository, StoreError, StreamStore};
use proptest::prelude::*;
use serde_json::{Value as JsonValue, json};

use crate::{
    Actor, BaseSchema, Command, CommandService, CqrsError, EntityConf, EntityRegistry, PropertyValidator,
    Reference, Role, RoleSet, Rule,
};

type Store = StreamStore<InMemoryEventRepository>;

fn payload(v: JsonValue) -> Payload {
    v.as_object().cloned().unwrap_or_default()
}

fn sid(s: &str) -> StreamId {
    StreamId::new(s).unwrap()
}

fn admin() -> Actor {
    Actor::new("alice", "acc-1", "admin")
}

fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .with(EntityConf::new("group").crud(false))
        .unwrap()
        .with(
            EntityConf::new("user")
                .base_schema(
                    BaseSchema::new()
                        .fields(["id", "accID", "name", "email", "group", "created", "createdBy", "updated", "updatedBy"])
                        .alias("mail", "email"),
                )
                .crud(false)
                .reference(Reference::single("group", "group").nullable())
                .validator(PropertyValidator::new("contact").property("email", &[Rule::Email])),
        )
        .unwrap()
}

fn service() -> CommandService<InMemoryEventRepository> {
    evstore_observability::init();
    let store: Arc<Store> = Arc::new(StreamStore::new(InMemoryEventRepository::new()));
    CommandService::new(store, registry(), &Settings::default()).unwrap()
}

fn create_user(svc: &CommandService<InMemoryEventRepository>, id: &str, email: &str) {
    svc.handle(
        Command::new("user", "UserCreated", payload(json!({"name": "Ann", "email": email}))).for_entity(id),
        &admin(),
    )
    .unwrap();
}

#[test]
fn crud_update_merges_into_created_state() {
    let svc = service();
    create_user(&svc, "u1", "ann@example.com");

    let out = svc
        .handle(
            Command::new("user", "UserUpdated", payload(json!({"email": "ann@new.example.com"}))).for_entity("u1"),
            &admin(),
        )
        .unwrap();
    assert_eq!(out.version, 1);

    let user = svc.entity("user", "u1").unwrap();
    assert_eq!(user.version, 1);
    assert_eq!(user.field("name"), Some(&json!("Ann")));
    assert_eq!(user.field("email"), Some(&json!("ann@new.example.com")));
    assert_eq!(user.field("createdBy"), Some(&json!("alice")));
    assert_eq!(user.field("updatedBy"), Some(&json!("alice")));
}

#[test]
fn create_on_deleted_entity_fails() {
    let svc = service();
    create_user(&svc, "u1", "ann@example.com");
    svc.handle(Command::new("user", "UserDeleted", Payload::new()).for_entity("u1"), &admin())
        .unwrap();

    let err = svc
        .handle(
            Command::new("user", "UserCreated", payload(json!({"name": "Bob"}))).for_entity("u1"),
            &admin(),
        )
        .unwrap_err();
    assert_eq!(err, CqrsError::EntityDeleted("u1".into()));
    assert_eq!(svc.entity("user", "u1").unwrap().version, 1);

    svc.handle(Command::new("user", "UserUnDeleted", Payload::new()).for_entity("u1"), &admin())
        .unwrap();
    assert!(!svc.entity("user", "u1").unwrap().deleted);
}

#[test]
fn unordered_history_stops_at_last_applied_event() {
    let reg = registry();
    let conf = reg.get("user").unwrap();
    let stream = sid("user-u1");
    let at = |version: u64, ty: &str, p: JsonValue| {
        Event::stored(EventId::generate(), NewEvent::new(stream.clone(), ty, payload(p)), version)
    };

    let history = vec![
        at(0, "UserCreated", json!({"name": "Ann"})),
        at(1, "UserUpdated", json!({"name": "Anna"})),
        at(3, "UserUpdated", json!({"name": "Annabel"})),
    ];

    let mut entity = Entity::new("u1");
    let mut failure = None;
    for event in &history {
        if let Err(e) = conf.replay(&mut entity, event) {
            failure = Some(e);
            break;
        }
    }

    assert_eq!(
        failure,
        Some(CqrsError::Ordering {
            entity_id: "u1".into(),
            at: 1,
            found: 3
        })
    );
    assert_eq!(entity.version, 1);
    assert_eq!(entity.field("name"), Some(&json!("Anna")));

    let whole = conf.aggregate("u1", history.into_iter().map(Ok::<_, StoreError>));
    assert!(matches!(whole, Err(CqrsError::Ordering { .. })));
}

#[test]
fn unknown_event_type_is_not_handled() {
    let svc = service();
    let err = svc
        .handle(Command::new("user", "UserPromoted", Payload::new()), &admin())
        .unwrap_err();
    assert!(matches!(err, CqrsError::EventNotHandled { .. }));

    let err = svc
        .handle(Command::new("invoice", "InvoiceCreated", Payload::new()), &admin())
        .unwrap_err();
    assert_eq!(err, CqrsError::UnknownEntity("invoice".into()));
}

#[test]
fn base_schema_rejects_unknown_fields_and_accepts_aliases() {
    let svc = service();
    let err = svc
        .handle(
            Command::new("user", "UserCreated", payload(json!({"name": "Ann", "age": 40}))),
            &admin(),
        )
        .unwrap_err();
    assert_eq!(err, CqrsError::UnknownField("age".into()));

    svc.handle(
        Command::new("user", "UserCreated", payload(json!({"name": "Ann", "mail": "x", "email": "ann@example.com"}))),
        &admin(),
    )
    .unwrap();
}

#[test]
fn base_schema_applies_regardless_of_builder_order() {
    let conf = EntityConf::new("user")
        .crud(false)
        .base_schema(BaseSchema::new().field("name"));
    let created = Event::stored(
        EventId::generate(),
        NewEvent::new(sid("user-u1"), "UserCreated", payload(json!({"name": "Ann", "bogus": 1}))),
        0,
    );

    let mut entity = Entity::new("u1");
    assert_eq!(
        conf.replay(&mut entity, &created),
        Err(CqrsError::UnknownField("bogus".into()))
    );
    assert!(entity.payload.is_empty());

    let svc = CommandService::new(
        Arc::new(StreamStore::new(InMemoryEventRepository::new())),
        EntityRegistry::new().with(conf).unwrap(),
        &Settings::default(),
    )
    .unwrap();
    let err = svc
        .handle(
            Command::new("user", "UserUpdated", payload(json!({"bogus": 1}))).for_entity("u1"),
            &admin(),
        )
        .unwrap_err();
    assert_eq!(err, CqrsError::UnknownField("bogus".into()));
}

#[test]
fn references_must_point_at_existing_entities() {
    let svc = service();
    let err = svc
        .handle(
            Command::new("user", "UserCreated", payload(json!({"name": "Ann", "group": "g1"}))),
            &admin(),
        )
        .unwrap_err();
    assert!(matches!(err, CqrsError::InvalidReference { ref field, .. } if field == "group"));

    svc.handle(Command::new("group", "GroupCreated", payload(json!({"title": "ops"}))).for_entity("g1"), &admin())
        .unwrap();
    svc.handle(
        Command::new(
            "user",
            "UserCreated",
            payload(json!({"name": "Ann", "group": "g1", "email": "ann@example.com"})),
        ),
        &admin(),
    )
    .unwrap();
}

#[test]
fn failing_validator_is_reported_by_name() {
    let svc = service();
    let err = svc
        .handle(
            Command::new("user", "UserCreated", payload(json!({"name": "Ann", "email": "nope"}))).for_entity("u1"),
            &admin(),
        )
        .unwrap_err();
    assert!(matches!(err, CqrsError::ValidationFailed { ref validator, .. } if validator == "contact"));
    assert!(svc.entity("user", "u1").is_err());
}

#[test]
fn version_lock_mismatch_leaves_entity_untouched() {
    let svc = service();
    create_user(&svc, "u1", "ann@example.com");

    let err = svc
        .handle(
            Command::new("user", "UserUpdated", payload(json!({"name": "Bob"})))
                .for_entity("u1")
                .locked(7),
            &admin(),
        )
        .unwrap_err();
    assert!(matches!(err, CqrsError::Store(StoreError::Concurrency { .. })));

    let user = svc.entity("user", "u1").unwrap();
    assert_eq!(user.version, 0);
    assert_eq!(user.field("name"), Some(&json!("Ann")));

    svc.handle(
        Command::new("user", "UserUpdated", payload(json!({"name": "Bob"})))
            .for_entity("u1")
            .locked(0),
        &admin(),
    )
    .unwrap();
}

#[test]
fn repeated_event_id_reports_original_outcome() {
    let svc = service();
    let id = EventId::new("cmd-1").unwrap();
    let cmd = Command::new("user", "UserCreated", payload(json!({"name": "Ann", "email": "ann@example.com"})))
        .for_entity("u1")
        .with_event_id(id.clone());

    let first = svc.handle(cmd.clone(), &admin()).unwrap();
    let err = svc.handle(cmd, &admin()).unwrap_err();

    match err {
        CqrsError::Store(StoreError::Duplicate(original)) => {
            assert_eq!(original.event_id, id);
            assert_eq!(original.version, first.version);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(svc.entity("user", "u1").unwrap().version, 0);
}

#[test]
fn command_events_are_linked_into_main_log() {
    let svc = service();
    create_user(&svc, "u1", "ann@example.com");
    create_user(&svc, "u2", "bob@example.com");

    assert_eq!(svc.main_log().as_str(), "evstore_log");
    let (cursor, version) = svc.store().range(svc.main_log()).unwrap();
    let links: Vec<Event> = cursor.map(|e| e.unwrap()).collect();

    assert_eq!(version, 1);
    assert!(links.iter().all(Event::is_link));
    assert_eq!(links[1].link.as_ref().unwrap().stream_id, sid("user-u2"));
}

#[test]
fn generated_entity_ids_are_returned() {
    let svc = service();
    let out = svc
        .handle(Command::new("group", "GroupCreated", payload(json!({"title": "ops"}))), &admin())
        .unwrap();
    assert!(!out.entity_id.is_empty());
    assert_eq!(out.version, 0);
    assert_eq!(
        svc.entity("group", &out.entity_id).unwrap().field("id"),
        Some(&json!(out.entity_id))
    );
}

#[test]
fn authorizer_refuses_denied_event_types() {
    let roles = RoleSet::new([Role::new("admin"), Role::new("clerk").deny("UserDeleted")]);
    let svc = service().with_authorizer(Arc::new(roles));
    create_user(&svc, "u1", "ann@example.com");

    let clerk = Actor::new("carl", "acc-1", "clerk");
    let err = svc
        .handle(Command::new("user", "UserDeleted", Payload::new()).for_entity("u1"), &clerk)
        .unwrap_err();
    assert!(matches!(err, CqrsError::Unauthorized { .. }));

    let ghost = Actor::new("gus", "acc-1", "ghost");
    assert!(svc
        .handle(Command::new("user", "UserUpdated", Payload::new()).for_entity("u1"), &ghost)
        .is_err());
}

#[test]
fn check_version_locks_on_replayed_version() {
    let reg = EntityRegistry::new().with(EntityConf::new("doc").crud(true)).unwrap();
    let store: Arc<Store> = Arc::new(StreamStore::new(InMemoryEventRepository::new()));
    let svc = CommandService::new(Arc::clone(&store), reg, &Settings::default()).unwrap();

    svc.handle(Command::new("doc", "DocCreated", payload(json!({"v": 0}))).for_entity("d1"), &admin())
        .unwrap();
    // A write that bypasses the service moves the stream on.
    store
        .append(NewEvent::new(sid("doc-d1"), "DocUpdated", payload(json!({"v": 1}))), AppendOptions::default())
        .unwrap();

    let out = svc
        .handle(Command::new("doc", "DocUpdated", payload(json!({"v": 2}))).for_entity("d1"), &admin())
        .unwrap();
    assert_eq!(out.version, 2);
}

#[test]
fn concurrent_commands_on_one_entity_serialize() {
    let svc = Arc::new(service());
    create_user(&svc, "u1", "ann@example.com");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                svc.handle(
                    Command::new("user", "UserUpdated", payload(json!({"name": format!("n{i}")}))).for_entity("u1"),
                    &admin(),
                )
                .unwrap()
                .version
            })
        })
        .collect();

    let mut versions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=8).collect::<Vec<_>>());
    assert_eq!(svc.entity("user", "u1").unwrap().version, 8);
}

/// Read model of user names, rebuilt from entity streams.
#[derive(Default)]
struct UserNames {
    tracker: VersionTracker,
    names: BTreeMap<StreamId, String>,
}

impl Projector for UserNames {
    fn version(&self, stream: &StreamId) -> Result<Option<u64>, ProjectionError> {
        Ok(self.tracker.version(stream))
    }

    fn apply(&mut self, event: &Event) -> Result<ApplyOutcome, ProjectionError> {
        let names = &mut self.names;
        self.tracker.advance(event, |e| {
            if let Some(name) = e.payload.get("name").and_then(JsonValue::as_str) {
                names.insert(e.stream_id.clone(), name.to_string());
            }
            Ok(())
        })
    }

    fn purge(&mut self) -> Result<(), ProjectionError> {
        self.tracker.clear();
        self.names.clear();
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Hooks(Arc<Mutex<Vec<(String, String)>>>);

impl Deliverer for Hooks {
    fn deliver(&self, url: &str, event: &Event) -> Result<(), DeliveryError> {
        self.0
            .lock()
            .unwrap()
            .push((url.to_string(), event.event_type.clone()));
        Ok(())
    }
}

fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn commands_reach_read_models_and_webhooks() {
    let settings = Settings::default();
    let hooks = Hooks::default();
    let fanout = Arc::new(PubFanout::start(InMemorySubscriptionRepository::new(), hooks.clone(), &settings).unwrap());
    fanout
        .add_subscription(Webhook::new("users", "^user-", "http://hooks.local/users"))
        .unwrap();

    let (feed, sub) = ReaderFeed::from_settings(&settings);
    let store: Arc<Store> = Arc::new(
        StreamStore::with_settings(InMemoryEventRepository::new(), &settings)
            .with_publisher(fanout.clone())
            .with_publisher(Arc::new(feed)),
    );
    let svc = CommandService::new(Arc::clone(&store), registry(), &settings).unwrap();

    let mut reader = ReaderClient::new(Arc::clone(&store), UserNames::default())
        .with_filter("^user-")
        .unwrap();
    reader.start(sub).unwrap();

    create_user(&svc, "u1", "ann@example.com");
    svc.handle(
        Command::new("user", "UserUpdated", payload(json!({"name": "Annie"}))).for_entity("u1"),
        &admin(),
    )
    .unwrap();
    svc.handle(Command::new("group", "GroupCreated", payload(json!({"title": "ops"}))), &admin())
        .unwrap();

    assert!(eventually(|| {
        reader
            .inspect(|r| r.names.get(&sid("user-u1")).cloned())
            .unwrap()
            .as_deref()
            == Some("Annie")
    }));
    assert!(eventually(|| hooks.0.lock().unwrap().len() == 2));

    let delivered = hooks.0.lock().unwrap().clone();
    assert_eq!(
        delivered,
        vec![
            ("http://hooks.local/users".to_string(), "UserCreated".to_string()),
            ("http://hooks.local/users".to_string(), "UserUpdated".to_string()),
        ]
    );
    reader.stop();
    fanout.stop();
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

    #[test]
    fn updates_merge_to_last_write_per_field(
        updates in prop::collection::vec(
            prop::collection::btree_map("[a-d]", 0i64..100, 1..3),
            1..10,
        )
    ) {
        let reg = EntityRegistry::new().with(EntityConf::new("doc").crud(false)).unwrap();
        let svc = CommandService::new(
            Arc::new(StreamStore::new(InMemoryEventRepository::new())),
            reg,
            &Settings::default(),
        )
        .unwrap();

        svc.handle(Command::new("doc", "DocCreated", Payload::new()).for_entity("d1"), &admin()).unwrap();

        let mut expected: BTreeMap<String, i64> = BTreeMap::new();
        for update in &updates {
            let p: Payload = update.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            svc.handle(Command::new("doc", "DocUpdated", p).for_entity("d1"), &admin()).unwrap();
            expected.extend(update.iter().map(|(k, v)| (k.clone(), *v)));
        }

        let doc = svc.entity("doc", "d1").unwrap();
        prop_assert_eq!(doc.version, updates.len() as u64);
        for (k, v) in expected {
            prop_assert_eq!(doc.field(&k), Some(&json!(v)));
        }
    }
}
