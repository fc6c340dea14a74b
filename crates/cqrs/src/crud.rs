//! Generic create/update/delete/undelete handling.

use chrono::Utc;
use evstore_core::{AppendOptions, Entity, Payload};
use serde_json::Value as JsonValue;

use crate::error::{CqrsError, CqrsResult};
use crate::handler::{EventHandler, HandledEvent, HandlerContext};

pub const CREATED: &str = "Created";
pub const UPDATED: &str = "Updated";
pub const DELETED: &str = "Deleted";
pub const UNDELETED: &str = "UnDeleted";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Op {
    Create,
    Update,
    Delete,
    Undelete,
}

/// CRUD handler for an entity type.
///
/// Handles `<Type>Created`, `<Type>Updated`, `<Type>Deleted` and
/// `<Type>UnDeleted`, where `<Type>` is the title-cased entity name.
/// Created and Updated payloads are held to the entity's base schema.
#[derive(Debug, Clone)]
pub struct CrudHandler {
    title: String,
    check_version: bool,
    require_base: bool,
}

impl CrudHandler {
    pub fn new(entity: &str) -> Self {
        Self {
            title: title_case(entity),
            check_version: false,
            require_base: false,
        }
    }

    /// Guard every non-creating append with the entity's current version.
    pub fn check_version(mut self, on: bool) -> Self {
        self.check_version = on;
        self
    }

    /// Refuse to register unless the entity declares a base schema.
    pub fn require_base(mut self, on: bool) -> Self {
        self.require_base = on;
        self
    }

    pub fn event_name(&self, suffix: &str) -> String {
        format!("{}{}", self.title, suffix)
    }

    fn op(&self, event_type: &str) -> Option<Op> {
        let suffix = event_type.strip_prefix(self.title.as_str())?;
        match suffix {
            CREATED => Some(Op::Create),
            UPDATED => Some(Op::Update),
            DELETED => Some(Op::Delete),
            UNDELETED => Some(Op::Undelete),
            _ => None,
        }
    }
}

impl EventHandler for CrudHandler {
    fn event_types(&self) -> Vec<String> {
        [CREATED, UPDATED, DELETED, UNDELETED]
            .iter()
            .map(|s| self.event_name(s))
            .collect()
    }

    fn checks_base(&self, event_type: &str) -> bool {
        matches!(self.op(event_type), Some(Op::Create | Op::Update))
    }

    fn requires_base(&self) -> bool {
        self.require_base
    }

    fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        event: &mut HandledEvent<'_>,
        entity: &mut Entity,
    ) -> CqrsResult<AppendOptions> {
        let op = self.op(event.event_type).ok_or_else(|| CqrsError::EventNotHandled {
            entity: self.title.to_lowercase(),
            event_type: event.event_type.to_string(),
        })?;

        let mut opts = AppendOptions::default();
        if self.check_version && event.version > 0 {
            opts = AppendOptions::locked(event.version - 1);
        }

        match op {
            Op::Create => {
                if entity.deleted {
                    return Err(CqrsError::EntityDeleted(ctx.entity_id.to_string()));
                }
                if ctx.is_live() {
                    stamp(ctx, event.payload.to_mut(), "createdBy", "created");
                    opts = AppendOptions::create();
                }
                entity.version = 0;
                entity.payload = event.payload.clone().into_owned();
            }
            Op::Update => {
                if entity.deleted {
                    return Err(CqrsError::EntityDeleted(ctx.entity_id.to_string()));
                }
                if ctx.is_live() {
                    stamp(ctx, event.payload.to_mut(), "updatedBy", "updated");
                }
                entity.merge(&event.payload);
            }
            Op::Delete => entity.deleted = true,
            Op::Undelete => entity.deleted = false,
        }

        Ok(opts)
    }
}

fn stamp(ctx: &HandlerContext<'_>, payload: &mut Payload, by: &str, at: &str) {
    payload.insert("id".into(), JsonValue::from(ctx.entity_id));
    if let Some(actor) = ctx.actor {
        payload.insert("accID".into(), JsonValue::from(actor.account_id.as_str()));
        payload.insert(by.into(), JsonValue::from(actor.user_id.as_str()));
    }
    payload.insert(at.into(), JsonValue::from(Utc::now().to_rfc3339()));
}

/// Upper-case the first letter of every word (`sales order` -> `Sales Order`).
/// Underscores and digits do not start a new word (`sales_order` -> `Sales_order`).
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut boundary = true;
    for c in name.chars() {
        if boundary && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        boundary = !(c.is_alphanumeric() || c == '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Actor;
    use serde_json::json;
    use std::borrow::Cow;

    fn payload(v: JsonValue) -> Payload {
        v.as_object().cloned().unwrap_or_default()
    }

    fn live<'a>(
        h: &CrudHandler,
        actor: &'a Actor,
        ty: &'a str,
        version: u64,
        p: Payload,
        entity: &mut Entity,
    ) -> CqrsResult<(AppendOptions, Payload)> {
        let ctx = HandlerContext::live("u1", actor);
        let mut ev = HandledEvent {
            event_type: ty,
            version,
            payload: Cow::Owned(p),
        };
        let opts = h.handle(&ctx, &mut ev, entity)?;
        Ok((opts, ev.payload.into_owned()))
    }

    #[test]
    fn title_case_capitalizes_words() {
        assert_eq!(title_case("user"), "User");
        assert_eq!(title_case("sales_order"), "Sales_order");
        assert_eq!(title_case("sales order"), "Sales Order");
        assert_eq!(title_case("v2_item"), "V2_item");
        assert_eq!(title_case("Already"), "Already");
    }

    #[test]
    fn event_names_follow_entity_title() {
        let h = CrudHandler::new("user");
        assert_eq!(
            h.event_types(),
            vec!["UserCreated", "UserUpdated", "UserDeleted", "UserUnDeleted"]
        );
        assert_eq!(h.op("UserUndeleted"), None);
        assert_eq!(h.op("OrderCreated"), None);

        let order = CrudHandler::new("sales_order");
        assert_eq!(order.event_types()[0], "Sales_orderCreated");
        assert!(order.checks_base("Sales_orderUpdated"));
        assert!(!order.checks_base("Sales_orderDeleted"));
    }

    #[test]
    fn live_create_stamps_and_requests_creation() {
        let h = CrudHandler::new("user");
        let actor = Actor::new("alice", "acc-1", "admin");
        let mut entity = Entity::new("u1");

        let (opts, stored) =
            live(&h, &actor, "UserCreated", 0, payload(json!({"name": "Ann"})), &mut entity).unwrap();

        assert!(opts.create);
        assert_eq!(stored.get("id"), Some(&json!("u1")));
        assert_eq!(stored.get("accID"), Some(&json!("acc-1")));
        assert_eq!(stored.get("createdBy"), Some(&json!("alice")));
        let created = stored.get("created").and_then(JsonValue::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
        assert_eq!(entity.field("name"), Some(&json!("Ann")));
    }

    #[test]
    fn replay_does_not_stamp() {
        let h = CrudHandler::new("user");
        let stored = payload(json!({"name": "Ann"}));
        let mut entity = Entity::new("u1");
        let mut ev = HandledEvent {
            event_type: "UserUpdated",
            version: 1,
            payload: Cow::Borrowed(&stored),
        };
        h.handle(&HandlerContext::replay("u1"), &mut ev, &mut entity).unwrap();

        assert!(matches!(ev.payload, Cow::Borrowed(_)));
        assert!(!entity.payload.contains_key("updated"));
    }

    #[test]
    fn deleted_entity_rejects_create_and_update() {
        let h = CrudHandler::new("user");
        let actor = Actor::new("alice", "acc-1", "admin");
        let mut entity = Entity::new("u1");
        entity.deleted = true;

        for ty in ["UserCreated", "UserUpdated"] {
            let err = live(&h, &actor, ty, 3, Payload::new(), &mut entity).unwrap_err();
            assert_eq!(err, CqrsError::EntityDeleted("u1".into()));
        }

        live(&h, &actor, "UserUnDeleted", 3, Payload::new(), &mut entity).unwrap();
        assert!(!entity.deleted);
    }

    #[test]
    fn check_version_locks_on_previous_version() {
        let h = CrudHandler::new("user").check_version(true);
        let actor = Actor::new("alice", "acc-1", "admin");
        let mut entity = Entity::new("u1");

        let (opts, _) = live(&h, &actor, "UserUpdated", 5, Payload::new(), &mut entity).unwrap();
        assert_eq!(opts, AppendOptions::locked(4));

        let plain = CrudHandler::new("user");
        let (opts, _) = live(&plain, &actor, "UserUpdated", 5, Payload::new(), &mut entity).unwrap();
        assert_eq!(opts, AppendOptions::default());
    }
}
