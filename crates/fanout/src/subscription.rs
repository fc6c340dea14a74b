//! Webhook subscriptions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FanoutError, FanoutResult};

/// A webhook: events whose stream id matches `regex` are POSTed to `url`.
/// An empty regex matches every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    #[serde(default)]
    pub regex: String,
    pub url: String,
}

impl Webhook {
    pub fn new(id: impl Into<String>, regex: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            regex: regex.into(),
            url: url.into(),
        }
    }

    /// Check the webhook and compile its filter.
    pub fn compile(&self) -> FanoutResult<CompiledWebhook> {
        if self.id.trim().is_empty() {
            return Err(FanoutError::Validation("empty id".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(FanoutError::Validation("empty url".to_string()));
        }

        // Relative URLs fail to parse without a base.
        Url::parse(&self.url)
            .map_err(|e| FanoutError::Validation(format!("url must be absolute: {e}")))?;

        let matcher = if self.regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&self.regex)
                    .map_err(|e| FanoutError::Validation(format!("bad regex: {e}")))?,
            )
        };

        Ok(CompiledWebhook {
            webhook: self.clone(),
            matcher,
        })
    }
}

/// A validated webhook with its filter compiled once.
#[derive(Debug, Clone)]
pub struct CompiledWebhook {
    webhook: Webhook,
    matcher: Option<Regex>,
}

impl CompiledWebhook {
    pub fn webhook(&self) -> &Webhook {
        &self.webhook
    }

    pub fn matches(&self, stream_id: &str) -> bool {
        self.matcher.as_ref().is_none_or(|re| re.is_match(stream_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rules() {
        assert!(Webhook::new("w1", "^orders-", "http://hooks.local/orders").compile().is_ok());
        assert!(Webhook::new("", "", "http://hooks.local").compile().is_err());
        assert!(Webhook::new("w1", "", "").compile().is_err());
        assert!(Webhook::new("w1", "", "/relative/path").compile().is_err());
        assert!(Webhook::new("w1", "([", "http://hooks.local").compile().is_err());
    }

    #[test]
    fn empty_regex_matches_everything() {
        let all = Webhook::new("w1", "", "http://hooks.local").compile().unwrap();
        assert!(all.matches("orders-42"));
        assert!(all.matches("users-1"));

        let orders = Webhook::new("w2", "^orders-", "http://hooks.local").compile().unwrap();
        assert!(orders.matches("orders-42"));
        assert!(!orders.matches("users-1"));
    }
}
