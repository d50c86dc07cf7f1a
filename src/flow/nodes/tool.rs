// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::adk::tool::ToolRegistry;
use crate::flow::resolver::resolve_map;
use crate::flow::state::{WorkflowState, TOOL_RESULTS};
use crate::flow::types::NodeDefinition;

static TOOL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "toolId": {"type": "string"},
            "parameters": {"type": "object"},
            "status": {"type": "string"},
            "result": {}
        }
    })
});

/// Resolves parameters and dispatches to a registered tool
///
/// When no tool is registered under the node's `toolId` the node only echoes
/// its resolved parameters.
pub struct ToolExecutor {
    tools: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl NodeExecutor for ToolExecutor {
    fn output_schema(&self) -> &Value {
        &TOOL_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        mut state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        tokio::task::yield_now().await;

        let tool_id = node.config_str("toolId").unwrap_or_default().to_string();
        let parameters = resolve_map(&node.config_map("parameters"), &state);

        let mut output = json!({
            "toolId": tool_id,
            "parameters": parameters,
            "status": "executed",
        });

        match self.tools.get(&tool_id).await {
            Some(tool) => match tool.execute(Value::Object(parameters)).await {
                Ok(result) => {
                    state
                        .scope_mut(TOOL_RESULTS)
                        .insert(tool_id.clone(), result.clone());
                    output["result"] = result;
                }
                Err(e) => {
                    log::warn!("Tool '{}' failed in node '{}': {}", tool_id, node.id, e);
                    output["status"] = json!("failed");
                    output["error"] = json!(e.to_string());
                }
            },
            None => log::debug!("No tool registered for '{}', echoing parameters", tool_id),
        }

        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}
