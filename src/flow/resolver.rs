// SPDX-License-Identifier: MIT

//! Template resolution against workflow state
//!
//! Templates reference state with `{{scope.path}}` placeholders. Supported
//! scopes are `flow`, `system`, `nodes`, `nodeOutput`, `interface`,
//! `toolResults`, `thread` and `messages`; path segments that are numbers
//! index into arrays.
//!
//! - A template that is exactly one placeholder yields the raw value it
//!   points at, so objects and numbers survive resolution.
//! - Placeholders embedded in surrounding text are stringified in place.
//! - Missing paths resolve to `""`.
//! - A bare literal with no placeholders is coerced to a bool, integer or
//!   float when it parses as one.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::flow::state::WorkflowState;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

const SCOPES: [&str; 8] = [
    "flow",
    "system",
    "nodes",
    "nodeOutput",
    "interface",
    "toolResults",
    "thread",
    "messages",
];

/// Resolve a template value against the state
///
/// Non-string values are returned unchanged.
pub fn resolve(template: &Value, state: &WorkflowState) -> Value {
    match template {
        Value::String(s) => resolve_str(s, state),
        other => other.clone(),
    }
}

/// Resolve a template string against the state
pub fn resolve_str(template: &str, state: &WorkflowState) -> Value {
    if let Some(expr) = whole_placeholder(template) {
        return match lookup(expr, state) {
            Some(Value::Null) | None => Value::String(String::new()),
            Some(value) => value.clone(),
        };
    }

    if !PLACEHOLDER.is_match(template) {
        return coerce_literal(template);
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        lookup(caps[1].trim(), state)
            .map(stringify)
            .unwrap_or_default()
    });
    Value::String(rendered.into_owned())
}

/// Resolve a template and render the result as text
pub fn resolve_to_string(template: &Value, state: &WorkflowState) -> String {
    stringify(&resolve(template, state))
}

/// Resolve every string inside a JSON structure
pub fn resolve_deep(value: &Value, state: &WorkflowState) -> Value {
    match value {
        Value::String(_) => resolve(value, state),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_deep(v, state)).collect()),
        Value::Object(map) => Value::Object(resolve_map(map, state)),
        other => other.clone(),
    }
}

/// Resolve each value of a map, keeping its keys
pub fn resolve_map(map: &Map<String, Value>, state: &WorkflowState) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_deep(v, state)))
        .collect()
}

/// Look up a dotted expression such as `nodes.fetch.statusCode`
pub fn lookup<'a>(expr: &str, state: &'a WorkflowState) -> Option<&'a Value> {
    let expr = expr.trim();
    let scope = expr.split('.').next()?;
    if !SCOPES.contains(&scope) {
        log::debug!("Unknown template scope '{}' in '{}'", scope, expr);
        return None;
    }
    state.get_path(expr)
}

/// Render a value for interpolation into text
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn whole_placeholder(template: &str) -> Option<&str> {
    let caps = PLACEHOLDER.captures(template)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == template.len() {
        caps.get(1).map(|m| m.as_str().trim())
    } else {
        None
    }
}

fn coerce_literal(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::String(text.to_string());
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if trimmed.contains('.') {
        if let Some(n) = trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    } else if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    Value::String(text.to_string())
}
