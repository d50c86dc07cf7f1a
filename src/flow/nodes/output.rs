// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use super::{NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::flow::resolver::resolve;
use crate::flow::state::WorkflowState;
use crate::flow::types::{NodeDefinition, OutputMapping};

static OUTPUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": true
    })
});

/// Terminal node; maps state into a flat result object
pub struct OutputExecutor;

/// Resolve a node's `outputMapping` against the state
///
/// Entries are `{ "value": <template> }`; a bare template is accepted too.
pub fn resolve_output_mapping(
    node: &NodeDefinition,
    state: &WorkflowState,
) -> Result<Value, FlowError> {
    let mapping: Map<String, Value> = node.config_field("outputMapping")?;
    let mut result = Map::new();
    for (key, entry) in mapping {
        let template = match entry {
            Value::Object(_) => {
                serde_json::from_value::<OutputMapping>(entry)
                    .map_err(|e| FlowError::invalid_config(&node.id, format!("{}: {}", key, e)))?
                    .value
            }
            bare => bare,
        };
        result.insert(key, resolve(&template, state));
    }
    Ok(Value::Object(result))
}

#[async_trait]
impl NodeExecutor for OutputExecutor {
    fn output_schema(&self) -> &Value {
        &OUTPUT_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let output = resolve_output_mapping(node, &state)?;
        Ok(NodeOutcome::new(output, state))
    }
}
