// SPDX-License-Identifier: MIT

//! JSON schema types for workflow definitions
//!
//! This module contains the data structures used for parsing workflow
//! definition files and the typed views of the node configs the engine
//! interprets (rules, variable updates, output mappings).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adk::error::FlowError;

/// Edge source marking the entry of a workflow
pub const START_SENTINEL: &str = "start";
/// Edge target marking the end of a workflow
pub const OUTPUT_SENTINEL: &str = "output";

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkflowDefinition {
    #[serde(alias = "agenticWorkflowId")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

impl WorkflowDefinition {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A node in the workflow graph
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeDefinition {
    /// Unique identifier for this node
    pub id: String,
    /// Type tag, resolved through the executor registry
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Value,
    /// Updates declared on the node itself rather than inside `config`
    #[serde(
        rename = "variableUpdates",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub variable_updates: Vec<VariableUpdate>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: None,
            config,
            variable_updates: Vec::new(),
        }
    }

    /// Raw config value for a key
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Config value for a key as a string slice
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key).and_then(Value::as_str)
    }

    /// Config value for a key as an object, empty when absent
    pub fn config_map(&self, key: &str) -> Map<String, Value> {
        self.config_value(key)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Deserialize a config field into a typed value; absent or null gives the default
    pub fn config_field<T>(&self, key: &str) -> Result<T, FlowError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.config_value(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| FlowError::invalid_config(&self.id, format!("{}: {}", key, e))),
        }
    }

    pub fn rules(&self) -> Result<Vec<Rule>, FlowError> {
        self.config_field("rules")
    }

    /// The node's variable updates; node-level entries take precedence over `config`
    pub fn updates(&self) -> Result<Vec<VariableUpdate>, FlowError> {
        if !self.variable_updates.is_empty() {
            return Ok(self.variable_updates.clone());
        }
        self.config_field("variableUpdates")
    }
}

/// How an edge is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeKind {
    #[default]
    Normal,
    /// Always-taken delegation transition
    Handoff,
}

/// A directed arc between two nodes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EdgeDefinition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: None,
            source_handle: None,
            data: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn handoff(mut self) -> Self {
        self.edge_type = Some("handoff".to_string());
        self
    }

    pub fn kind(&self) -> EdgeKind {
        match self.edge_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("handoff") => EdgeKind::Handoff,
            _ => EdgeKind::Normal,
        }
    }

    pub fn handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or_default()
    }
}

/// A named, ordered set of conditions
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default = "default_enabled")]
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_type: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_enabled() -> bool {
    true
}

/// One comparison; `field` and `value` are templates
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Condition {
    #[serde(default)]
    pub field: Value,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

/// A state mutation instruction
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableUpdate {
    /// Dotted path; the first segment selects the scope
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default)]
    pub value: Value,
    /// Message role for `thread.messages` updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Gating rule; the update is skipped unless it matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Rule>,
}

/// One entry of an output node's `outputMapping`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct OutputMapping {
    #[serde(default)]
    pub value: Value,
}
