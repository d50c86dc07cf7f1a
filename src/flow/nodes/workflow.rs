// SPDX-License-Identifier: MIT

//! Sub-workflow node
//!
//! Runs another workflow to completion with the caller's state plus the
//! node's resolved `inputs` under `interface.inputs`, then folds the child's
//! final state back into the caller with the state reducer. Only the
//! messages the child appended are carried back, so the caller's log is not
//! duplicated.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::flow::graph::compiler::CompilerHandle;
use crate::flow::resolver::resolve_map;
use crate::flow::state::{WorkflowState, MESSAGES};
use crate::flow::types::NodeDefinition;

static WORKFLOW_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "workflowId": {"type": "string"},
            "inputs": {"type": "object"},
            "status": {"type": "string"},
            "messages": {"type": "array"},
            "result": {"type": "object"}
        }
    })
});

/// The workflow id a node refers to, if any
pub fn referenced_workflow(node: &NodeDefinition) -> Option<&str> {
    node.config_str("agenticWorkflowId")
        .or_else(|| node.config_str("workflowId"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

pub struct WorkflowExecutor {
    compiler: CompilerHandle,
}

impl WorkflowExecutor {
    pub fn new(compiler: CompilerHandle) -> Self {
        Self { compiler }
    }

    async fn run_child(
        &self,
        workflow_id: &str,
        inputs: Map<String, Value>,
        parent: &WorkflowState,
    ) -> Result<(WorkflowState, Value), FlowError> {
        let graph = self.compiler.compile_by_id(workflow_id)?;

        let mut child = parent.clone();
        child.set_interface_inputs(inputs);

        let done = graph.execute(child).await?;
        Ok((done.state, done.output))
    }
}

/// Keep only the messages appended after the first `parent_len`
fn appended_messages(mut child: WorkflowState, parent_len: usize) -> WorkflowState {
    let appended: Vec<Value> = child.messages().iter().skip(parent_len).cloned().collect();
    child.set(MESSAGES, Value::Array(appended));
    child
}

#[async_trait]
impl NodeExecutor for WorkflowExecutor {
    fn output_schema(&self) -> &Value {
        &WORKFLOW_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let Some(workflow_id) = referenced_workflow(node) else {
            log::warn!("Workflow node '{}' has no workflow id", node.id);
            return Ok(NodeOutcome::new(
                json!({ "error": "No workflow ID specified" }),
                state,
            ));
        };

        let inputs = resolve_map(&node.config_map("inputs"), &state);
        log::info!("Workflow node '{}' invoking '{}'", node.id, workflow_id);

        let (output, state) = match self.run_child(workflow_id, inputs.clone(), &state).await {
            Ok((finished, result)) => {
                let output = json!({
                    "workflowId": workflow_id,
                    "inputs": inputs,
                    "status": "completed",
                    "messages": finished.messages(),
                    "result": result,
                });
                let parent_len = state.messages().len();
                let merged = state.merge(&appended_messages(finished, parent_len));
                (output, merged)
            }
            Err(e) => {
                log::error!("Sub-workflow '{}' failed: {}", workflow_id, e);
                let output = json!({
                    "error": e.to_string(),
                    "workflowId": workflow_id,
                    "status": "failed",
                });
                (output, state)
            }
        };

        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}
