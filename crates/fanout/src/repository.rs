//! Persistence boundary for webhook subscriptions.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{FanoutError, FanoutResult};
use crate::subscription::Webhook;

pub trait SubscriptionRepository: Send + Sync {
    /// Insert or replace by id.
    fn store(&self, webhook: &Webhook) -> FanoutResult<()>;

    fn list(&self) -> FanoutResult<Vec<Webhook>>;

    fn delete(&self, id: &str) -> FanoutResult<()>;
}

impl<R> SubscriptionRepository for Arc<R>
where
    R: SubscriptionRepository + ?Sized,
{
    fn store(&self, webhook: &Webhook) -> FanoutResult<()> {
        (**self).store(webhook)
    }

    fn list(&self) -> FanoutResult<Vec<Webhook>> {
        (**self).list()
    }

    fn delete(&self, id: &str) -> FanoutResult<()> {
        (**self).delete(id)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepository {
    hooks: RwLock<BTreeMap<String, Webhook>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionRepository for InMemorySubscriptionRepository {
    fn store(&self, webhook: &Webhook) -> FanoutResult<()> {
        self.hooks
            .write()
            .map_err(|_| FanoutError::Backend("lock poisoned".to_string()))?
            .insert(webhook.id.clone(), webhook.clone());
        Ok(())
    }

    fn list(&self) -> FanoutResult<Vec<Webhook>> {
        Ok(self
            .hooks
            .read()
            .map_err(|_| FanoutError::Backend("lock poisoned".to_string()))?
            .values()
            .cloned()
            .collect())
    }

    fn delete(&self, id: &str) -> FanoutResult<()> {
        self.hooks
            .write()
            .map_err(|_| FanoutError::Backend("lock poisoned".to_string()))?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| FanoutError::NotFound(id.to_string()))
    }
}
