// SPDX-License-Identifier: MIT

//! Node executors
//!
//! Every node type has one [`NodeExecutor`] implementation, registered by
//! type tag in the [`NodeExecutorRegistry`]. An executor takes the node
//! definition and the incoming state by value and returns the node's output
//! together with the updated state.

pub mod agent;
pub mod http_request;
pub mod output;
pub mod registry;
pub mod rule;
pub mod start;
pub mod tool;
pub mod variable_update;
pub mod workflow;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adk::error::FlowError;
use crate::adk::http::{HttpTransport, ReqwestTransport};
use crate::adk::model::ChatModel;
use crate::adk::tool::ToolRegistry;
use crate::flow::graph::compiler::CompilerHandle;
use crate::flow::state::{apply_variable_updates, WorkflowState};
use crate::flow::types::NodeDefinition;

pub use registry::{ExecutorFactory, NodeExecutorRegistry};

/// Result of running one node
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub output: Value,
    pub state: WorkflowState,
    /// Rule matched against the state the node received. Informational:
    /// the compiled router evaluates the rules again on the state after the
    /// node's own updates, so the two can differ.
    pub matched_rule_id: Option<String>,
}

impl NodeOutcome {
    pub fn new(output: Value, state: WorkflowState) -> Self {
        Self {
            output,
            state,
            matched_rule_id: None,
        }
    }

    pub fn with_route(mut self, rule_id: impl Into<String>) -> Self {
        self.matched_rule_id = Some(rule_id.into());
        self
    }
}

/// Execution strategy for one node type
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// JSON schema describing the output this executor produces
    fn output_schema(&self) -> &Value;

    /// Run the node against the state
    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError>;
}

/// Built-in node kinds, used for structural decisions at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Start,
    Output,
    Rule,
    VariableUpdate,
    Workflow,
    Tool,
    Agent,
    Llm,
    HttpRequest,
    /// A tag registered by the embedding application
    Custom(String),
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match normalize_tag(tag).as_str() {
            "start" => Self::Start,
            "output" => Self::Output,
            "rule" => Self::Rule,
            "variable-update" => Self::VariableUpdate,
            "workflow" => Self::Workflow,
            "tool" => Self::Tool,
            "agent" => Self::Agent,
            "llm" => Self::Llm,
            "http-request" => Self::HttpRequest,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Output => "output",
            Self::Rule => "rule",
            Self::VariableUpdate => "variable-update",
            Self::Workflow => "workflow",
            Self::Tool => "tool",
            Self::Agent => "agent",
            Self::Llm => "llm",
            Self::HttpRequest => "http-request",
            Self::Custom(tag) => tag,
        }
    }
}

/// Lowercase a type tag and turn spaces and underscores into hyphens
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_ascii_lowercase()
        .split(|c: char| c == ' ' || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// External capabilities executors call into
#[derive(Clone)]
pub struct Collaborators {
    pub model: Option<Arc<dyn ChatModel>>,
    pub http: Arc<dyn HttpTransport>,
    pub tools: ToolRegistry,
}

impl Collaborators {
    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            model: None,
            http: Arc::new(ReqwestTransport::default()),
            tools: ToolRegistry::new(),
        }
    }
}

/// Everything a factory may hand to the executor it builds
#[derive(Clone)]
pub struct ExecutorServices {
    pub collaborators: Collaborators,
    pub compiler: CompilerHandle,
}

/// Apply a node's variable updates after it produced `output`
pub(crate) fn apply_updates(
    node: &NodeDefinition,
    output: &Value,
    state: WorkflowState,
) -> Result<WorkflowState, FlowError> {
    let updates = node.updates()?;
    Ok(apply_variable_updates(&updates, output, state))
}
