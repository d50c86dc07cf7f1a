// SPDX-License-Identifier: MIT

//! Rule evaluator for conditional routing and gated updates

use serde_json::Value;

use super::operator::{LogicType, Operator};
use crate::flow::resolver::{resolve, stringify};
use crate::flow::state::WorkflowState;
use crate::flow::types::{Condition, Rule};

/// Route id returned when no rule matches
pub const DEFAULT_ROUTE: &str = "default";

/// Evaluate rules in order and return the id of the first match
pub fn evaluate_rules(rules: &[Rule], state: &WorkflowState) -> String {
    rules
        .iter()
        .find(|rule| evaluate_rule(rule, state))
        .map(|rule| rule.rule_id.clone())
        .unwrap_or_else(|| DEFAULT_ROUTE.to_string())
}

/// Evaluate a single rule against the state
pub fn evaluate_rule(rule: &Rule, state: &WorkflowState) -> bool {
    if !rule.enable {
        return false;
    }
    if rule.conditions.is_empty() {
        return true;
    }

    match LogicType::parse(rule.logic_type.as_deref()) {
        LogicType::Default => true,
        LogicType::And => rule.conditions.iter().all(|c| evaluate_condition(c, state)),
        LogicType::Or => rule.conditions.iter().any(|c| evaluate_condition(c, state)),
    }
}

/// Resolve both sides of a condition and compare them
pub fn evaluate_condition(condition: &Condition, state: &WorkflowState) -> bool {
    let Some(op) = Operator::parse(&condition.operator) else {
        log::warn!("Unknown operator '{}', condition is false", condition.operator);
        return false;
    };

    let field = resolve(&condition.field, state);
    let expected = resolve(&condition.value, state);
    compare(&field, op, &expected)
}

/// Apply an operator to two resolved values
pub fn compare(field: &Value, op: Operator, expected: &Value) -> bool {
    match op {
        Operator::Equals => loose_equal(field, expected),
        Operator::NotEquals => !loose_equal(field, expected),
        Operator::Contains => contains(field, expected),
        Operator::IsEmpty => is_empty(field),
        Operator::IsNotEmpty => !is_empty(field),
        Operator::GreaterThan => compare_numbers(field, expected, |a, b| a > b),
        Operator::LessThan => compare_numbers(field, expected, |a, b| a < b),
    }
}

/// JSON equality, numeric equality, or equal string forms
pub fn loose_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a == b;
    }
    stringify(left) == stringify(right)
}

fn contains(field: &Value, expected: &Value) -> bool {
    match field {
        Value::Array(items) => items.iter().any(|item| loose_equal(item, expected)),
        other => stringify(other).contains(&stringify(expected)),
    }
}

/// Null, false, zero, empty collections and blank strings are empty
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare_numbers<F>(left: &Value, right: &Value, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}
