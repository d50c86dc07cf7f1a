// SPDX-License-Identifier: MIT

//! Variable update application
//!
//! Nodes carry `variableUpdates` that write into the `flow`, `system` and
//! `thread` scopes after they run. Updates apply in order, and each one sees
//! the state as mutated by the updates before it.

use serde_json::{Map, Value};

use super::store::{ensure_object, WorkflowState, FLOW, NODES, NODE_OUTPUT, SYSTEM};
use crate::flow::condition::evaluate_rule;
use crate::flow::resolver::resolve;
use crate::flow::types::VariableUpdate;

const THREAD: &str = "thread";

/// What an update does to its target field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperation {
    Set,
    Append,
    Extend,
}

impl UpdateOperation {
    pub fn parse(name: Option<&str>) -> Option<Self> {
        match name.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("set") => Some(Self::Set),
            Some("append") => Some(Self::Append),
            Some("extend") => Some(Self::Extend),
            _ => None,
        }
    }
}

/// Apply a batch of updates after a node produced `node_output`
pub fn apply_variable_updates(
    updates: &[VariableUpdate],
    node_output: &Value,
    mut state: WorkflowState,
) -> WorkflowState {
    state.set(NODE_OUTPUT, node_output.clone());
    for scope in [FLOW, SYSTEM, NODES] {
        state.scope_mut(scope);
    }

    for update in updates {
        if let Some(rule) = &update.rules {
            if !evaluate_rule(rule, &state) {
                log::debug!("Skipping update of '{}': gating rule did not match", update.field_name);
                continue;
            }
        }

        let Some(op) = UpdateOperation::parse(update.operation.as_deref()) else {
            log::warn!(
                "Unknown operation {:?} for '{}', skipping",
                update.operation,
                update.field_name
            );
            continue;
        };

        let value = resolve(&update.value, &state);
        apply_one(&mut state, update, op, value);
    }

    state
}

fn apply_one(state: &mut WorkflowState, update: &VariableUpdate, op: UpdateOperation, value: Value) {
    let parts: Vec<&str> = update.field_name.split('.').collect();
    if parts.len() < 2 {
        log::warn!("Variable path '{}' has no scope, skipping", update.field_name);
        return;
    }
    let (scope, path) = (parts[0], &parts[1..]);

    match scope {
        FLOW | SYSTEM => write_path(state.scope_mut(scope), path, op, value),
        THREAD if path == ["messages"] => {
            let role = update.role.as_deref().unwrap_or("user");
            append_messages(state, role, op, value);
        }
        THREAD => write_path(state.scope_mut(THREAD), path, op, value),
        other => log::warn!("Unknown variable scope '{}', skipping", other),
    }
}

fn append_messages(state: &mut WorkflowState, role: &str, op: UpdateOperation, value: Value) {
    let message = |content: Value| serde_json::json!({ "content": content, "role": role });
    match (op, value) {
        (UpdateOperation::Set, _) => {
            log::warn!("'set' on thread.messages is not supported, skipping");
        }
        (UpdateOperation::Extend, Value::Array(items)) => {
            let messages = state.messages_mut();
            messages.extend(items.into_iter().map(message));
        }
        (_, value) => state.push_message(message(value)),
    }
}

fn write_path(target: &mut Map<String, Value>, path: &[&str], op: UpdateOperation, value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = target;
    for part in parents {
        let slot = current.entry(part.to_string()).or_insert(Value::Null);
        current = ensure_object(slot);
    }

    match op {
        UpdateOperation::Set => {
            current.insert(last.to_string(), value);
        }
        UpdateOperation::Append | UpdateOperation::Extend => {
            let slot = current
                .entry(last.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = slot else {
                log::debug!("Field '{}' is not a list, {:?} ignored", last, op);
                return;
            };
            match (op, value) {
                (UpdateOperation::Extend, Value::Array(more)) => items.extend(more),
                (_, value) => items.push(value),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::state::MESSAGES;
    use serde_json::json;

    fn updates(value: Value) -> Vec<VariableUpdate> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_set_creates_nested_maps() {
        let batch = updates(json!([
            {"fieldName": "flow.customer.name", "value": "Ada"},
            {"fieldName": "system.count", "operation": "set", "value": "3"}
        ]));

        let state = apply_variable_updates(&batch, &json!({}), WorkflowState::empty());
        assert_eq!(state.get_path("flow.customer.name"), Some(&json!("Ada")));
        assert_eq!(state.get_path("system.count"), Some(&json!(3)));
        assert_eq!(state.get("nodes"), Some(&json!({})));
    }

    #[test]
    fn test_node_output_is_visible_to_updates() {
        let batch = updates(json!([
            {"fieldName": "flow.answer", "value": "{{nodeOutput.text}}"}
        ]));

        let state = apply_variable_updates(&batch, &json!({"text": "42"}), WorkflowState::initial());
        assert_eq!(state.get_path("flow.answer"), Some(&json!("42")));
        assert_eq!(state.get(NODE_OUTPUT), Some(&json!({"text": "42"})));
    }

    #[test]
    fn test_append_and_extend() {
        let batch = updates(json!([
            {"fieldName": "flow.items", "operation": "append", "value": "a"},
            {"fieldName": "flow.items", "operation": "extend", "value": "{{flow.more}}"},
            {"fieldName": "flow.items", "operation": "extend", "value": "z"},
            {"fieldName": "flow.scalar", "operation": "append", "value": "ignored"}
        ]));
        let state = WorkflowState::from_value(json!({
            "flow": {"more": ["b", "c"], "scalar": "keep"}
        }));

        let state = apply_variable_updates(&batch, &json!({}), state);
        assert_eq!(state.get_path("flow.items"), Some(&json!(["a", "b", "c", "z"])));
        assert_eq!(state.get_path("flow.scalar"), Some(&json!("keep")));
    }

    #[test]
    fn test_gating_sees_earlier_updates() {
        let batch = updates(json!([
            {"fieldName": "flow.stage", "value": "ready"},
            {
                "fieldName": "flow.go",
                "value": "true",
                "rules": {
                    "conditions": [{"field": "{{flow.stage}}", "operator": "equals", "value": "ready"}]
                }
            },
            {
                "fieldName": "flow.never",
                "value": "x",
                "rules": {
                    "conditions": [{"field": "{{flow.stage}}", "operator": "equals", "value": "done"}]
                }
            }
        ]));

        let state = apply_variable_updates(&batch, &json!({}), WorkflowState::initial());
        assert_eq!(state.get_path("flow.go"), Some(&json!(true)));
        assert!(state.get_path("flow.never").is_none());
    }

    #[test]
    fn test_thread_messages() {
        let batch = updates(json!([
            {"fieldName": "thread.messages", "operation": "append", "value": "hi"},
            {"fieldName": "thread.messages", "operation": "extend", "value": ["a", "b"], "role": "assistant"},
            {"fieldName": "thread.messages", "operation": "set", "value": "dropped"},
            {"fieldName": "thread.topic", "value": "billing"}
        ]));

        let state = apply_variable_updates(&batch, &json!({}), WorkflowState::initial());
        assert_eq!(
            state.get(MESSAGES),
            Some(&json!([
                {"content": "hi", "role": "user"},
                {"content": "a", "role": "assistant"},
                {"content": "b", "role": "assistant"}
            ]))
        );
        assert_eq!(state.get_path("thread.topic"), Some(&json!("billing")));
    }

    #[test]
    fn test_invalid_paths_are_skipped() {
        let batch = updates(json!([
            {"fieldName": "flow", "value": "x"},
            {"fieldName": "other.field", "value": "x"},
            {"fieldName": "flow.ok", "operation": "multiply", "value": "x"}
        ]));

        let state = apply_variable_updates(&batch, &json!({}), WorkflowState::initial());
        assert_eq!(state.get("flow"), Some(&json!({})));
        assert!(state.get("other").is_none());
    }
}
