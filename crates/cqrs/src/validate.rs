//! Named entity validators.

use std::net::IpAddr;
use std::sync::OnceLock;

use evstore_core::Entity;
use regex::Regex;
use serde_json::Value as JsonValue;
use url::Url;

/// A named check run against the entity after a live command mutated it.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` carries a human readable reason.
    fn validate(&self, entity: &Entity) -> Result<(), String>;
}

/// Per-field rule understood by [`PropertyValidator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rule {
    String,
    Id,
    Email,
    Url,
    Ip,
    NotNull,
}

impl Rule {
    fn check(self, field: &str, value: Option<&JsonValue>) -> Result<(), String> {
        let value = value.unwrap_or(&JsonValue::Null);
        let text = value.as_str();
        let ok = match self {
            Rule::NotNull => !value.is_null(),
            Rule::String => text.is_some(),
            Rule::Id => text.is_some_and(valid_id),
            Rule::Email => text.is_some_and(valid_email),
            Rule::Url => text.is_some_and(valid_url),
            Rule::Ip => text.is_some_and(|s| s.parse::<IpAddr>().is_ok()),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{field} is not a valid {}", self.label()))
        }
    }

    fn label(self) -> &'static str {
        match self {
            Rule::String => "string",
            Rule::Id => "id",
            Rule::Email => "email",
            Rule::Url => "url",
            Rule::Ip => "ip",
            Rule::NotNull => "value (null)",
        }
    }
}

fn valid_email(s: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$").ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Entity ids: non-empty, at most 64 characters of `[A-Za-z0-9_]`.
pub fn valid_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn valid_url(s: &str) -> bool {
    Url::parse(s).is_ok_and(|u| u.has_host())
}

/// Validator built from field rules; the first failing rule is reported.
#[derive(Debug, Clone)]
pub struct PropertyValidator {
    name: String,
    properties: Vec<(String, Vec<Rule>)>,
}

impl PropertyValidator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, field: impl Into<String>, rules: &[Rule]) -> Self {
        self.properties.push((field.into(), rules.to_vec()));
        self
    }
}

impl Validator for PropertyValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, entity: &Entity) -> Result<(), String> {
        for (field, rules) in &self.properties {
            let value = entity.field(field);
            rules.iter().try_for_each(|r| r.check(field, value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(v: JsonValue) -> Entity {
        let mut e = Entity::new("u1");
        e.payload = v.as_object().cloned().unwrap_or_default();
        e
    }

    #[test]
    fn rules_accept_well_formed_values() {
        let v = PropertyValidator::new("profile")
            .property("name", &[Rule::String, Rule::NotNull])
            .property("owner", &[Rule::Id])
            .property("email", &[Rule::Email])
            .property("site", &[Rule::Url])
            .property("addr", &[Rule::Ip]);

        let ok = entity(json!({
            "name": "Ann",
            "owner": "0190f1c2_ab",
            "email": "ann@example.com",
            "site": "https://example.com/x",
            "addr": "10.0.0.1"
        }));
        assert_eq!(v.validate(&ok), Ok(()));
    }

    #[test]
    fn first_failure_is_reported() {
        let v = PropertyValidator::new("profile")
            .property("email", &[Rule::Email])
            .property("addr", &[Rule::Ip]);

        let bad = entity(json!({"email": "not-an-email", "addr": "999.1.1.1"}));
        assert_eq!(v.validate(&bad), Err("email is not a valid email".to_string()));
    }

    #[test]
    fn missing_field_fails_typed_rules() {
        let v = PropertyValidator::new("p").property("name", &[Rule::String]);
        assert!(v.validate(&entity(json!({}))).is_err());
        assert!(!valid_id("has-dash"));
        assert!(!valid_url("not a url"));
        assert!(v.validate(&entity(json!({"name": "x"}))).is_ok());
    }
}
