// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::flow::state::WorkflowState;
use crate::flow::types::NodeDefinition;

static START_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "status": {"type": "string"}
        }
    })
});

/// Entry node; bootstraps scoped variables through its updates
pub struct StartExecutor;

#[async_trait]
impl NodeExecutor for StartExecutor {
    fn output_schema(&self) -> &Value {
        &START_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let output = json!({ "status": "started" });
        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}
