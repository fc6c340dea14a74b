//! Entity type configuration and aggregation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use evstore_core::{AppendOptions, Entity, Event, Payload};

use crate::crud::CrudHandler;
use crate::error::{ConfigError, CqrsError, CqrsResult};
use crate::handler::{EventHandler, HandledEvent, HandlerContext};
use crate::reference::{EntityLookup, Reference};
use crate::schema::BaseSchema;
use crate::validate::Validator;

/// Everything the command path knows about one entity type.
pub struct EntityConf {
    name: String,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    references: Vec<Reference>,
    validators: Vec<Arc<dyn Validator>>,
    base: Option<BaseSchema>,
}

impl EntityConf {
    /// New entity type; the name is lowercased.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            handlers: HashMap::new(),
            references: Vec::new(),
            validators: Vec::new(),
            base: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the CRUD event family for this entity. Created/Updated are
    /// base-checked whenever the entity declares a base schema.
    pub fn crud(self, check_version: bool) -> Self {
        let handler = CrudHandler::new(&self.name).check_version(check_version);
        self.handler(handler)
    }

    /// Route every event type `handler` declares to it; later registrations
    /// take over an event type.
    pub fn handler<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        for ty in handler.event_types() {
            self.handlers.insert(ty, Arc::clone(&handler));
        }
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn base_schema(mut self, schema: BaseSchema) -> Self {
        self.base = Some(schema);
        self
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Startup checks run by the registry.
    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.contains(['-', '|', '$']) {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.validators.iter().find(|v| !seen.insert(v.name())) {
            return Err(ConfigError::DuplicateValidator {
                entity: self.name.clone(),
                validator: dup.name().to_string(),
            });
        }

        if self.base.is_none() {
            let mut types: Vec<&String> = self.handlers.keys().collect();
            types.sort();
            if let Some(ty) = types.into_iter().find(|ty| self.handlers[*ty].requires_base()) {
                return Err(ConfigError::MissingBaseSchema {
                    entity: self.name.clone(),
                    event_type: ty.clone(),
                });
            }
        }
        Ok(())
    }

    fn route(&self, event_type: &str) -> CqrsResult<&Arc<dyn EventHandler>> {
        self.handlers
            .get(event_type)
            .ok_or_else(|| CqrsError::EventNotHandled {
                entity: self.name.clone(),
                event_type: event_type.to_string(),
            })
    }

    fn check_base(&self, handler: &dyn EventHandler, event_type: &str, payload: &Payload) -> CqrsResult<()> {
        match &self.base {
            Some(schema) if handler.checks_base(event_type) => schema.check(payload),
            _ => Ok(()),
        }
    }

    /// Rebuild an entity from its stored events, in order.
    pub fn aggregate<I, E>(&self, entity_id: &str, events: I) -> CqrsResult<Entity>
    where
        I: IntoIterator<Item = Result<Event, E>>,
        CqrsError: From<E>,
    {
        let mut entity = Entity::new(entity_id);
        for event in events {
            self.replay(&mut entity, &event?)?;
        }
        Ok(entity)
    }

    /// Apply one stored event. On error `entity` keeps the state of the last
    /// applied event.
    ///
    /// An event must sit right after the entity's version; version 0 is
    /// always accepted. Link events only advance the version.
    pub fn replay(&self, entity: &mut Entity, event: &Event) -> CqrsResult<()> {
        if event.is_link() {
            entity.version = event.version;
            return Ok(());
        }

        let handler = self.route(&event.event_type)?;
        if event.version != entity.version + 1 && event.version != 0 {
            return Err(CqrsError::Ordering {
                entity_id: entity.id.clone(),
                at: entity.version,
                found: event.version,
            });
        }
        self.check_base(handler.as_ref(), &event.event_type, &event.payload)?;

        let mut handled = HandledEvent {
            event_type: &event.event_type,
            version: event.version,
            payload: Cow::Borrowed(&event.payload),
        };
        let id = entity.id.clone();
        handler.handle(&HandlerContext::replay(&id), &mut handled, entity)?;
        entity.version = event.version;
        Ok(())
    }

    /// Live path: apply a command's event to the current entity, then check
    /// references and validators. Returns the store preconditions and the
    /// payload to store.
    pub fn execute<L: EntityLookup + ?Sized>(
        &self,
        ctx: &HandlerContext<'_>,
        entity: &mut Entity,
        event_type: &str,
        version: u64,
        payload: Payload,
        lookup: &L,
    ) -> CqrsResult<(AppendOptions, Payload)> {
        let handler = self.route(event_type)?;
        self.check_base(handler.as_ref(), event_type, &payload)?;

        let mut handled = HandledEvent {
            event_type,
            version,
            payload: Cow::Owned(payload),
        };
        let opts = handler.handle(ctx, &mut handled, entity)?;

        for reference in &self.references {
            reference.check(entity, lookup)?;
        }
        for validator in &self.validators {
            validator
                .validate(entity)
                .map_err(|reason| CqrsError::ValidationFailed {
                    validator: validator.name().to_string(),
                    reason,
                })?;
        }

        entity.version = version;
        Ok((opts, handled.payload.into_owned()))
    }
}

impl std::fmt::Debug for EntityConf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("EntityConf")
            .field("name", &self.name)
            .field("event_types", &types)
            .field("references", &self.references)
            .field("validators", &self.validators.iter().map(|v| v.name()).collect::<Vec<_>>())
            .field("base", &self.base)
            .finish()
    }
}
