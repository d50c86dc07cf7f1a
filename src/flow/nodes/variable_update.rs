// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::flow::state::WorkflowState;
use crate::flow::types::NodeDefinition;

static UPDATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "status": {"type": "string"}
        }
    })
});

/// Applies variable updates and nothing else
pub struct VariableUpdateExecutor;

#[async_trait]
impl NodeExecutor for VariableUpdateExecutor {
    fn output_schema(&self) -> &Value {
        &UPDATE_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let output = json!({ "status": "updated" });
        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}
