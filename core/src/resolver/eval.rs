use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::expr::RefExpr;
use super::parser::parse;

/// Produce an injected copy of a task's parameter map, substituting
/// reference expressions against already-completed results.
pub fn resolve_parameters(
    params: &Map<String, Value>,
    completed: &HashMap<String, Value>,
) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, completed)))
        .collect()
}

/// Strings go through the reference grammar; lists resolve element-wise,
/// recursively; everything else passes through unchanged.
pub fn resolve_value(value: &Value, completed: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(raw) => evaluate(&parse(raw), raw, completed),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, completed))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn evaluate(expr: &RefExpr, raw: &str, completed: &HashMap<String, Value>) -> Value {
    match expr {
        // Session-context refs are the orchestrator's job and must already
        // have been substituted; anything left passes through untouched.
        RefExpr::Literal | RefExpr::SessionContext(_) => Value::String(raw.to_string()),

        RefExpr::TaskRef(_) | RefExpr::FieldPath { .. } => eval_ref(expr, completed)
            .unwrap_or_else(|| {
                warn!(reference = raw, "unresolved task reference, leaving literal");
                Value::String(raw.to_string())
            }),

        RefExpr::Join(parts) => {
            let mut out = Vec::new();
            for part in parts {
                match eval_ref(part, completed) {
                    Some(v) if !is_empty_scalar(&v) => out.push(v),
                    Some(_) => {}
                    None => warn!(reference = raw, "unresolved join piece, skipping"),
                }
            }
            Value::Array(out)
        }

        RefExpr::Concat(sides) => {
            let mut out = Vec::new();
            for (side_raw, side) in sides {
                let value = match side {
                    RefExpr::Literal => Value::String(side_raw.clone()),
                    _ => eval_ref(side, completed).unwrap_or_else(|| {
                        warn!(reference = side_raw.as_str(), "unresolved concat side");
                        Value::String(side_raw.clone())
                    }),
                };
                match value {
                    Value::Array(items) => out.extend(items),
                    other => out.push(other),
                }
            }
            Value::Array(out)
        }
    }
}

fn eval_ref(expr: &RefExpr, completed: &HashMap<String, Value>) -> Option<Value> {
    match expr {
        RefExpr::TaskRef(task_id) => completed.get(task_id).cloned(),
        RefExpr::FieldPath { task_id, path } => {
            let terminal = walk_path(completed.get(task_id)?, path)?;
            Some(collapse_title_list(terminal))
        }
        _ => None,
    }
}

fn walk_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// A terminal list of mapping objects each exposing a string `title`
/// collapses to the plain list of titles. Downstream formatting depends on
/// this exact shape, including the silent loss of sibling fields.
fn collapse_title_list(value: &Value) -> Value {
    if let Value::Array(items) = value {
        if !items.is_empty() {
            let titles: Option<Vec<Value>> = items
                .iter()
                .map(|item| {
                    item.as_object()
                        .and_then(|obj| obj.get("title"))
                        .and_then(Value::as_str)
                        .map(|t| Value::String(t.to_string()))
                })
                .collect();
            if let Some(titles) = titles {
                return Value::Array(titles);
            }
        }
    }
    value.clone()
}

fn is_empty_scalar(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
