//! Record context and evaluation scope.
//!
//! A [`Context`] is the caller's snapshot of the current record's field
//! values. A [`Scope`] layers the acting user on top of it for the duration of
//! a single evaluation, without copying or mutating the record.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root path segment that resolves to the acting user.
pub const USER_KEY: &str = "user";

/// The current record's field values, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    fields: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Non-object input yields an empty
    /// context.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(map) => Self {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            },
            _ => Self::default(),
        }
    }

    /// Parse a context from JSON text, which must hold an object.
    pub fn parse(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        if !json.is_object() {
            return Err(Error::InvalidContext(format!(
                "expected a JSON object, got {}",
                Value::from(json).type_name()
            )));
        }
        Ok(Self::from_json(json))
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// A read-only view of a record context augmented with the acting user.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    record: &'a Context,
    user: &'a Value,
}

impl<'a> Scope<'a> {
    pub fn new(record: &'a Context, user: &'a Value) -> Self {
        Self { record, user }
    }

    pub fn record(&self) -> &'a Context {
        self.record
    }

    pub fn user(&self) -> &'a Value {
        self.user
    }

    /// Resolve a dotted field path.
    ///
    /// A missing segment and an explicit `null` both resolve to
    /// [`Value::Null`].
    pub fn resolve(&self, path: &str) -> Value {
        let mut parts = path.split('.');
        let root = match parts.next() {
            Some(USER_KEY) => Some(self.user.clone()),
            Some(name) => self.record.get(name).cloned(),
            None => None,
        };

        let mut current = match root {
            Some(v) => v,
            None => return Value::Null,
        };
        for part in parts {
            if current.is_null() {
                return Value::Null;
            }
            current = match current.get(part) {
                Some(v) => v,
                None => return Value::Null,
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> Value {
        Value::from(json!({"id": 1, "role": {"name": "admin"}, "email": "a@example.com"}))
    }

    #[test]
    fn parse_requires_an_object() {
        let ctx = Context::parse(r#"{"status": "draft"}"#).unwrap();
        assert_eq!(ctx.get("status"), Some(&Value::from("draft")));

        assert!(matches!(Context::parse("[1, 2]"), Err(Error::InvalidContext(_))));
        assert!(matches!(Context::parse("{"), Err(Error::Serialization(_))));
    }

    #[test]
    fn resolves_plain_fields() {
        let ctx = Context::from_json(json!({"status": "draft", "amount": 12}));
        let user = Value::Null;
        let scope = Scope::new(&ctx, &user);
        assert_eq!(scope.resolve("status"), Value::from("draft"));
        assert_eq!(scope.resolve("amount"), Value::from(12));
        assert_eq!(scope.resolve("missing"), Value::Null);
    }

    #[test]
    fn resolves_user_paths() {
        let ctx = Context::new();
        let user = user();
        let scope = Scope::new(&ctx, &user);
        assert_eq!(scope.resolve("user.role.name"), Value::from("admin"));
        assert_eq!(scope.resolve("user.id"), Value::from(1));
    }

    #[test]
    fn null_intermediate_resolves_to_null() {
        let ctx = Context::new();
        let user = Value::from(json!({"role": null}));
        let scope = Scope::new(&ctx, &user);
        assert_eq!(scope.resolve("user.role.name"), Value::Null);
        assert_eq!(scope.resolve("user.nothing.at.all"), Value::Null);
    }

    #[test]
    fn user_shadows_record_key() {
        let ctx = Context::new().with("user", "record-level");
        let user = user();
        let scope = Scope::new(&ctx, &user);
        assert_eq!(scope.resolve("user.id"), Value::from(1));
        // The caller's context is untouched.
        assert_eq!(ctx.get("user"), Some(&Value::from("record-level")));
    }

    #[test]
    fn resolves_through_relations() {
        let ctx = Context::from_json(json!({"partner_id": {"id": 7, "display_name": "Acme"}}));
        let user = Value::Null;
        let scope = Scope::new(&ctx, &user);
        assert_eq!(scope.resolve("partner_id.id"), Value::from(7));
        assert_eq!(scope.resolve("partner_id.display_name"), Value::from("Acme"));
    }

    #[test]
    fn non_object_json_gives_empty_context() {
        assert!(Context::from_json(json!([1, 2])).is_empty());
    }
}
