//! Collection filter evaluation for the mock engine.
//!
//! Understands the operator subset tests use: `eq ne gt ge lt le in notIn`,
//! with nested field objects for sub-documents.

use serde_json::Value;
use std::cmp::Ordering;

const OPERATORS: [&str; 8] = ["eq", "ne", "gt", "ge", "lt", "le", "in", "notIn"];

/// Whether `document` satisfies `filter`. A null or empty filter matches all.
pub fn matches(filter: &Value, document: &Value) -> bool {
    let Some(fields) = filter.as_object() else {
        return filter.is_null();
    };
    fields.iter().all(|(field, condition)| {
        let value = document.get(field).unwrap_or(&Value::Null);
        field_matches(condition, value)
    })
}

fn field_matches(condition: &Value, value: &Value) -> bool {
    let Some(ops) = condition.as_object() else {
        return false;
    };
    ops.iter().all(|(op, operand)| {
        if OPERATORS.contains(&op.as_str()) {
            apply(op, operand, value)
        } else {
            // Nested sub-document filter
            let nested = value.get(op).unwrap_or(&Value::Null);
            field_matches(operand, nested)
        }
    })
}

fn apply(op: &str, operand: &Value, value: &Value) -> bool {
    match op {
        "eq" => compare(value, operand) == Some(Ordering::Equal),
        "ne" => compare(value, operand) != Some(Ordering::Equal),
        "gt" => compare(value, operand) == Some(Ordering::Greater),
        "ge" => matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal)),
        "lt" => compare(value, operand) == Some(Ordering::Less),
        "le" => matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal)),
        "in" => in_list(operand, value),
        "notIn" => !in_list(operand, value),
        _ => false,
    }
}

fn in_list(operand: &Value, value: &Value) -> bool {
    operand
        .as_array()
        .is_some_and(|items| items.iter().any(|item| compare(value, item) == Some(Ordering::Equal)))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
