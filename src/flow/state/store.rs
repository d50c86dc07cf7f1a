// SPDX-License-Identifier: MIT

//! Runtime state threaded through workflow execution
//!
//! The state is a JSON object with a handful of well-known scopes
//! (`messages`, `flow`, `system`, `nodes`, `toolResults`, `interface`,
//! `nodeOutput`, `iteration_count`). Any other top-level key is carried
//! along untouched.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const MESSAGES: &str = "messages";
pub const FLOW: &str = "flow";
pub const SYSTEM: &str = "system";
pub const NODES: &str = "nodes";
pub const TOOL_RESULTS: &str = "toolResults";
pub const INTERFACE: &str = "interface";
pub const NODE_OUTPUT: &str = "nodeOutput";
pub const ITERATION_COUNT: &str = "iteration_count";

/// Caller-provided overrides for a fresh top-level state
#[derive(Debug, Clone, Default)]
pub struct InitialState {
    pub flow: Map<String, Value>,
    pub system: Map<String, Value>,
    pub interface_inputs: Map<String, Value>,
    pub attachments: Vec<Value>,
}

/// Runtime workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    fields: Map<String, Value>,
}

impl WorkflowState {
    /// Create an empty state with no scopes at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object; non-objects give an empty state
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::empty(),
        }
    }

    /// Default scope layout with no user query
    pub fn initial() -> Self {
        let mut state = Self::empty();
        state.set(MESSAGES, json!([]));
        state.set(FLOW, Value::Object(Map::new()));
        state.set(SYSTEM, Value::Object(Map::new()));
        state.set(NODES, Value::Object(Map::new()));
        state.set(TOOL_RESULTS, Value::Object(Map::new()));
        state.set(INTERFACE, json!({ "inputs": {} }));
        state.set(ITERATION_COUNT, json!(0));
        state
    }

    /// State for a top-level invocation started by a user query
    pub fn for_user_query(query: &str, overrides: InitialState) -> Self {
        let mut state = Self::initial();
        state.push_message(json!({ "role": "user", "content": query }));

        let mut flow = Map::new();
        flow.insert("agentId".into(), json!(""));
        flow.insert("selectedAgentId".into(), json!(""));
        flow.insert("currentAgentName".into(), json!(""));
        flow.insert("isPvRendered".into(), json!(false));
        flow.insert("partialViewData".into(), json!([]));
        flow.extend(overrides.flow);
        state.set(FLOW, Value::Object(flow));

        let mut system = Map::new();
        system.insert("userQuery".into(), json!(query));
        system.insert("attachments".into(), Value::Array(overrides.attachments));
        system.extend(overrides.system);
        state.set(SYSTEM, Value::Object(system));

        let mut inputs = Map::new();
        inputs.insert("message".into(), json!(query));
        inputs.extend(overrides.interface_inputs);
        state.set_interface_inputs(inputs);

        state
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested value using dot notation (e.g., "flow.customer.name")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Mutable access to an object scope, replacing a non-object value
    pub fn scope_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        ensure_object(self.fields.entry(key.to_string()).or_insert(Value::Null))
    }

    /// Read-only view of an object scope
    pub fn scope(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object)
    }

    /// The message log
    pub fn messages(&self) -> &[Value] {
        self.fields
            .get(MESSAGES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn messages_mut(&mut self) -> &mut Vec<Value> {
        let slot = self
            .fields
            .entry(MESSAGES.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("messages slot was just made an array"),
        }
    }

    pub fn push_message(&mut self, message: Value) {
        self.messages_mut().push(message);
    }

    /// Record a node's output under `nodes[<id>]`, overwriting earlier runs
    pub fn set_node_output(&mut self, node_id: &str, output: Value) {
        self.scope_mut(NODES).insert(node_id.to_string(), output);
    }

    pub fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.scope(NODES).and_then(|nodes| nodes.get(node_id))
    }

    pub fn set_interface_inputs(&mut self, inputs: Map<String, Value>) {
        self.scope_mut(INTERFACE)
            .insert("inputs".into(), Value::Object(inputs));
    }

    pub fn interface_inputs(&self) -> Option<&Map<String, Value>> {
        self.get_path("interface.inputs").and_then(Value::as_object)
    }

    pub fn iteration_count(&self) -> u64 {
        self.fields
            .get(ITERATION_COUNT)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn increment_iteration(&mut self) {
        let next = self.iteration_count() + 1;
        self.set(ITERATION_COUNT, json!(next));
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Replace `value` with an empty object unless it already is one
pub(crate) fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}
