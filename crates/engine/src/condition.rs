//! Condition semantics.
//!
//! Equality rules, in priority order:
//!
//! 1. expected `false` is an emptiness test on the field value
//! 2. `null` equals only `null`
//! 3. a relation-shaped field value compares by its `id`
//! 4. expected boolean compares by truthiness
//! 5. expected string compares by string coercion
//! 6. two arrays are equal only when both are empty
//! 7. otherwise strict equality of scalars
//!
//! Rule 1 always wins over rule 4, so `('f', '=', False)` and
//! `('f', '!=', False)` work as "is empty" / "is set" tests.

use crate::ast::{Condition, Operator};
use domaineval_core::{Scope, Value};
use regex_lite::Regex;
use std::cmp::Ordering;
use tracing::warn;

/// Evaluate a single condition against a scope.
pub fn evaluate_condition(condition: &Condition, scope: &Scope<'_>) -> bool {
    let actual = scope.resolve(&condition.field);
    apply_operator(condition.operator, &actual, &condition.value)
}

/// Apply `operator` to an already-resolved field value.
pub fn apply_operator(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Eq => compare_equal(actual, expected),
        Operator::Ne => !compare_equal(actual, expected),
        Operator::Lt => compare_order(actual, expected) == Some(Ordering::Less),
        Operator::Gt => compare_order(actual, expected) == Some(Ordering::Greater),
        Operator::Le => matches!(
            compare_order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Ge => matches!(
            compare_order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => compare_in(actual, expected),
        Operator::NotIn => !compare_in(actual, expected),
        Operator::Like => compare_like(actual, expected, false),
        Operator::Ilike => compare_like(actual, expected, true),
    }
}

/// Evaluate a raw `[field, operator, value]` token.
///
/// An operator outside the supported set makes the condition false.
pub(crate) fn evaluate_tuple(field: &str, operator: &Value, expected: &Value, scope: &Scope<'_>) -> bool {
    let parsed = operator.as_str().and_then(|op| op.parse::<Operator>().ok());
    match parsed {
        Some(op) => apply_operator(op, &scope.resolve(field), expected),
        None => {
            warn!(field, operator = %operator, "Unsupported operator in condition, treating as false");
            false
        }
    }
}

fn compare_equal(actual: &Value, expected: &Value) -> bool {
    if matches!(expected, Value::Bool(false)) {
        return actual.is_empty_value();
    }

    match (actual.is_null(), expected.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }

    let actual = actual.relation_id().unwrap_or(actual);

    match (actual, expected) {
        (_, Value::Bool(b)) => actual.is_truthy() == *b,
        (_, Value::String(s)) => actual.to_display_string() == *s,
        (Value::Array(a), Value::Array(b)) => a.is_empty() && b.is_empty(),
        _ => strict_equal(actual, expected),
    }
}

/// Same variant and same scalar value. Arrays, objects and relations are
/// never strictly equal.
fn strict_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

fn compare_order(actual: &Value, expected: &Value) -> Option<Ordering> {
    if actual.is_null() || expected.is_null() {
        return None;
    }

    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::String(s), other) | (other, Value::String(s)) if other.as_number().is_some() => {
            let numeric = s.trim().parse::<f64>().ok();
            let ordering = match numeric {
                Some(n) => {
                    let other = other.as_number()?;
                    if matches!(actual, Value::String(_)) {
                        n.partial_cmp(&other)
                    } else {
                        other.partial_cmp(&n)
                    }
                }
                None => None,
            };
            ordering.or_else(|| Some(display_cmp(actual, expected)))
        }
        _ => match (actual.as_number(), expected.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(display_cmp(actual, expected)),
        },
    }
}

fn display_cmp(a: &Value, b: &Value) -> Ordering {
    a.to_display_string().cmp(&b.to_display_string())
}

fn compare_in(actual: &Value, expected: &Value) -> bool {
    let Some(candidates) = expected.as_array() else {
        return compare_equal(actual, expected);
    };
    let actual = actual.relation_id().unwrap_or(actual);
    candidates.iter().any(|candidate| strict_equal(actual, candidate))
}

fn compare_like(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    if actual.is_null() || pattern.is_null() {
        return false;
    }

    let mut text = actual.to_display_string();
    let mut pattern = pattern.to_display_string();
    if case_insensitive {
        text = text.to_lowercase();
        pattern = pattern.to_lowercase();
    }

    match like_regex(&pattern) {
        Ok(re) => re.is_match(&text),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Could not compile like pattern");
            false
        }
    }
}

/// Translate a SQL `LIKE` pattern into an unanchored regex.
fn like_regex(pattern: &str) -> Result<Regex, regex_lite::Error> {
    let mut source = String::from("(?s)");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex_lite::escape(other.encode_utf8(&mut buf))),
        }
    }
    Regex::new(&source)
}
