//! The command boundary: load, decide, append.

use std::sync::Arc;

use evstore_core::{Entity, NewEvent, Settings, StreamId, new_entity_id};
use evstore_events::StripedLocks;
use evstore_store::{EventRepository, StoreError, StreamStore};
use tracing::{debug, info, instrument, warn};

use crate::command::{Actor, Command, CommandOutcome};
use crate::conf::EntityConf;
use crate::error::{CqrsError, CqrsResult};
use crate::handler::HandlerContext;
use crate::registry::EntityRegistry;
use crate::role::Authorizer;

/// Executes commands against entity streams.
///
/// ```text
/// Command
///   -> authorize (role may emit event type)
///   -> lock the entity stream
///   -> replay the entity from the store
///   -> handler + references + validators (live mode)
///   -> append to the entity stream, linked into the correlation stream
/// ```
///
/// Commands on different entities run in parallel; commands on one entity
/// are serialized. Every error is returned to the caller.
pub struct CommandService<R> {
    store: Arc<StreamStore<R>>,
    registry: EntityRegistry,
    authorizer: Option<Arc<dyn Authorizer>>,
    main_log: StreamId,
    locks: StripedLocks,
}

impl<R> CommandService<R>
where
    R: EventRepository,
{
    pub fn new(store: Arc<StreamStore<R>>, registry: EntityRegistry, settings: &Settings) -> CqrsResult<Self> {
        Ok(Self {
            store,
            registry,
            authorizer: None,
            main_log: StreamId::new(settings.main_log())?,
            locks: StripedLocks::default(),
        })
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<StreamStore<R>> {
        &self.store
    }

    /// Stream every command event is linked into.
    pub fn main_log(&self) -> &StreamId {
        &self.main_log
    }

    #[instrument(
        skip(self, command, actor),
        fields(entity = %command.entity_type, event_type = %command.event_type, role = %actor.role),
        err
    )]
    pub fn handle(&self, command: Command, actor: &Actor) -> CqrsResult<CommandOutcome> {
        let Command {
            entity_type,
            entity_id,
            event_type,
            event_id,
            payload,
            version_lock,
        } = command;

        let conf = self.registry.get(&entity_type)?;
        if let Some(auth) = &self.authorizer {
            if !auth.can(&actor.role, &event_type) {
                warn!(user = %actor.user_id, "command refused");
                return Err(CqrsError::Unauthorized {
                    role: actor.role.clone(),
                    event_type,
                });
            }
        }
        if !conf.handles(&event_type) {
            return Err(CqrsError::EventNotHandled {
                entity: conf.name().to_string(),
                event_type,
            });
        }

        let entity_id = entity_id.filter(|id| !id.is_empty()).unwrap_or_else(new_entity_id);
        let stream = StreamId::for_entity(conf.name(), &entity_id)?;
        let _guard = self.locks.lock(&stream)?;

        let (mut entity, next) = match self.load(conf, &stream, &entity_id)? {
            Some(e) => {
                let next = e.version + 1;
                (e, next)
            }
            None => (Entity::new(entity_id.as_str()), 0),
        };

        let ctx = HandlerContext::live(&entity_id, actor);
        let (mut opts, payload) =
            conf.execute(&ctx, &mut entity, &event_type, next, payload, self.store.as_ref())?;
        if let Some(v) = version_lock {
            opts.lock = true;
            opts.expected_version = v;
        }

        let mut event = NewEvent::new(stream, event_type, payload).with_links([self.main_log.clone()]);
        event.id = event_id;
        let appended = self.store.append(event, opts)?;

        info!(entity_id = %entity_id, version = appended.version, "command applied");
        Ok(CommandOutcome {
            entity_id,
            event_id: appended.event_id,
            version: appended.version,
        })
    }

    /// Current state of an entity.
    pub fn entity(&self, entity_type: &str, id: &str) -> CqrsResult<Entity> {
        let conf = self.registry.get(entity_type)?;
        let stream = StreamId::for_entity(conf.name(), id)?;
        self.load(conf, &stream, id)?
            .ok_or(CqrsError::Store(StoreError::StreamNotFound(stream)))
    }

    fn load(&self, conf: &EntityConf, stream: &StreamId, id: &str) -> CqrsResult<Option<Entity>> {
        let (cursor, version) = match self.store.range(stream) {
            Ok(found) => found,
            Err(StoreError::StreamNotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entity = conf.aggregate(id, cursor)?;
        // Purged streams replay nothing but keep their version.
        entity.version = version;
        debug!(stream_id = %stream, version, "entity loaded");
        Ok(Some(entity))
    }
}

impl<R> std::fmt::Debug for CommandService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandService")
            .field("entities", &self.registry)
            .field("main_log", &self.main_log)
            .finish_non_exhaustive()
    }
}
