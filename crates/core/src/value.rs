//! The closed value type that flows through domain conditions.
//!
//! Record field values, condition literals and user attributes all arrive as
//! loosely-typed JSON. They are normalized into [`Value`] once, and every
//! comparison rule is a pattern match over its variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The key that carried a relation's label in its source object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelKey {
    #[default]
    DisplayName,
    Name,
}

impl LabelKey {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelKey::DisplayName => "display_name",
            LabelKey::Name => "name",
        }
    }

    fn parse(key: &str) -> Option<Self> {
        match key {
            "display_name" => Some(LabelKey::DisplayName),
            "name" => Some(LabelKey::Name),
            _ => None,
        }
    }
}

/// A field value, condition literal, or user attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// Absent or null.
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// A reference to another record: `{"id": 7}`, `{"id": 7, "display_name": "Acme"}`
    /// or `{"id": 7, "name": "Acme"}`. Converts back to JSON with the same keys.
    Relation {
        id: Box<Value>,
        display_name: Option<String>,
        label_key: LabelKey,
    },
    /// Any other JSON object.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Build a relation value from an id and an optional label.
    pub fn relation(id: impl Into<Value>, display_name: Option<&str>) -> Self {
        Value::Relation {
            id: Box::new(id.into()),
            display_name: display_name.map(String::from),
            label_key: LabelKey::DisplayName,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key on an object-like value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(key).cloned(),
            Value::Relation { id, display_name, .. } => match key {
                "id" => Some((**id).clone()),
                "display_name" | "name" => display_name.clone().map(Value::String),
                _ => None,
            },
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).cloned()),
            _ => None,
        }
    }

    /// The `id` of a relation-shaped value.
    ///
    /// Both [`Value::Relation`] and plain objects carrying an `id` key count.
    pub fn relation_id(&self) -> Option<&Value> {
        match self {
            Value::Relation { id, .. } => Some(id),
            Value::Object(map) => map.get("id"),
            _ => None,
        }
    }

    /// Emptiness as used by the `('field', '=', False)` convention.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Relation { id, .. } => relation_id_is_empty(id),
            Value::Object(map) => match map.get("id") {
                Some(id) => relation_id_is_empty(id),
                None => map.is_empty(),
            },
            Value::Number(n) => *n == 0.0,
        }
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Relation { .. } | Value::Object(_) => true,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Relation { .. } => "relation",
            Value::Object(_) => "object",
        }
    }

    /// Numeric view of numbers and booleans.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// String coercion used by string equality, pattern matching and the
    /// ordering fallback.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Relation { id, display_name, .. } => display_name
                .clone()
                .unwrap_or_else(|| id.to_display_string()),
            Value::Object(_) => serde_json::Value::from(self.clone()).to_string(),
        }
    }
}

/// `Some(label)` when `map` is exactly an `id` plus at most one string label.
/// Anything else stays a plain object so it converts back unchanged.
fn relation_label(map: &serde_json::Map<String, serde_json::Value>) -> Option<Option<LabelKey>> {
    if !map.contains_key("id") {
        return None;
    }
    match map.len() {
        1 => Some(None),
        2 => {
            let (key, value) = map.iter().find(|(k, _)| k.as_str() != "id")?;
            let label = LabelKey::parse(key)?;
            value.is_string().then_some(Some(label))
        }
        _ => None,
    }
}

fn relation_id_is_empty(id: &Value) -> bool {
    match id {
        Value::Null => true,
        Value::Number(n) => *n == 0.0,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{s}'"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(mut map) => match relation_label(&map) {
                Some(label) => {
                    let id = map.remove("id").map(Value::from).unwrap_or_default();
                    let (display_name, label_key) = match label {
                        Some(key) => (
                            map.remove(key.as_str())
                                .and_then(|v| v.as_str().map(String::from)),
                            key,
                        ),
                        None => (None, LabelKey::default()),
                    };
                    Value::Relation {
                        id: Box::new(id),
                        display_name,
                        label_key,
                    }
                }
                None => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
            },
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
                    serde_json::Value::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Relation {
                id,
                display_name,
                label_key,
            } => {
                let mut map = serde_json::Map::new();
                map.insert("id".into(), serde_json::Value::from(*id));
                if let Some(name) = display_name {
                    map.insert(label_key.as_str().into(), serde_json::Value::String(name));
                }
                serde_json::Value::Object(map)
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_object_with_id_becomes_relation() {
        let v = Value::from(json!({"id": 5, "display_name": "Acme"}));
        assert_eq!(v, Value::relation(5, Some("Acme")));

        let v = Value::from(json!({"id": 5, "name": "Acme"}));
        assert!(matches!(v, Value::Relation { label_key: LabelKey::Name, .. }));
        assert_eq!(v.get("display_name"), Some(Value::from("Acme")));
    }

    #[test]
    fn relations_convert_back_with_their_own_keys() {
        for json in [
            json!({"id": 7}),
            json!({"id": 7, "name": "Acme"}),
            json!({"id": 7, "display_name": "Acme"}),
            json!({"id": 7, "name": "Acme", "display_name": "Acme Corp"}),
            json!({"id": 7, "name": null}),
            json!({"id": 7, "name": 12}),
        ] {
            assert_eq!(serde_json::Value::from(Value::from(json.clone())), json);
        }
    }

    #[test]
    fn rich_object_with_id_stays_object_but_is_relation_shaped() {
        let v = Value::from(json!({"id": 3, "email": "a@b.c"}));
        assert!(matches!(v, Value::Object(_)));
        assert_eq!(v.relation_id(), Some(&Value::Number(3.0)));
    }

    #[test]
    fn emptiness_rule() {
        for empty in [
            json!(null),
            json!(false),
            json!(""),
            json!("   "),
            json!([]),
            json!({"id": null}),
            json!({"id": 0}),
            json!({"id": ""}),
            json!({}),
            json!(0),
        ] {
            assert!(Value::from(empty.clone()).is_empty_value(), "{empty} should be empty");
        }
        for full in [json!("x"), json!(1), json!(true), json!([1]), json!({"id": 5})] {
            assert!(!Value::from(full.clone()).is_empty_value(), "{full} should not be empty");
        }
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
    }

    #[test]
    fn display_string_coercion() {
        assert_eq!(Value::from(5).to_display_string(), "5");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::from(true).to_display_string(), "true");
        assert_eq!(Value::Null.to_display_string(), "null");
        assert_eq!(Value::from(vec![1, 2]).to_display_string(), "1,2");
        assert_eq!(Value::relation(9, None).to_display_string(), "9");
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        let v = Value::from(vec![Value::from("a"), Value::from("="), Value::from(1)]);
        assert_eq!(serde_json::to_value(&v).unwrap(), json!(["a", "=", 1]));
        assert_eq!(serde_json::to_value(Value::from(2.5)).unwrap(), json!(2.5));
    }

    #[test]
    fn get_walks_objects_relations_and_arrays() {
        let v = Value::from(json!({"role": {"name": "admin"}, "tags": ["a", "b"]}));
        let role = v.get("role").unwrap();
        assert_eq!(role.get("name"), Some(Value::from("admin")));
        assert_eq!(v.get("tags").unwrap().get("1"), Some(Value::from("b")));

        let rel = Value::relation(4, Some("Bob"));
        assert_eq!(rel.get("id"), Some(Value::from(4)));
        assert_eq!(rel.get("name"), Some(Value::from("Bob")));
        assert_eq!(rel.get("missing"), None);
    }
}
