// SPDX-License-Identifier: MIT

//! Node executor registry - maps type tags to executor factories

use std::collections::HashMap;
use std::sync::Arc;

use super::agent::{AgentExecutor, LlmExecutor};
use super::http_request::HttpRequestExecutor;
use super::output::OutputExecutor;
use super::rule::RuleExecutor;
use super::start::StartExecutor;
use super::tool::ToolExecutor;
use super::variable_update::VariableUpdateExecutor;
use super::workflow::WorkflowExecutor;
use super::{normalize_tag, ExecutorServices, NodeExecutor};
use crate::adk::error::FlowError;

/// Builds an executor for one node from the shared services
pub type ExecutorFactory =
    Arc<dyn Fn(&ExecutorServices) -> Arc<dyn NodeExecutor> + Send + Sync>;

/// Open registry of node types
///
/// Tags are normalized on the way in and on lookup, so `http request`,
/// `http_request` and `http-request` name the same executor.
#[derive(Clone, Default)]
pub struct NodeExecutorRegistry {
    factories: HashMap<String, ExecutorFactory>,
}

impl NodeExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in node type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("start", |_| Arc::new(StartExecutor));
        registry.register("output", |_| Arc::new(OutputExecutor));
        registry.register("rule", |_| Arc::new(RuleExecutor));
        registry.register("variable-update", |_| Arc::new(VariableUpdateExecutor));
        registry.register("workflow", |services| {
            Arc::new(WorkflowExecutor::new(services.compiler.clone()))
        });
        registry.register("tool", |services| {
            Arc::new(ToolExecutor::new(services.collaborators.tools.clone()))
        });
        registry.register("agent", |services| {
            Arc::new(AgentExecutor::new(services.collaborators.model.clone()))
        });
        registry.register("llm", |services| {
            Arc::new(LlmExecutor::new(services.collaborators.model.clone()))
        });
        registry.register("http-request", |services| {
            Arc::new(HttpRequestExecutor::new(services.collaborators.http.clone()))
        });
        registry
    }

    /// Register a factory, replacing any existing one for the same tag
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn(&ExecutorServices) -> Arc<dyn NodeExecutor> + Send + Sync + 'static,
    {
        self.factories.insert(normalize_tag(tag), Arc::new(factory));
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(&normalize_tag(tag))
    }

    /// Instantiate the executor for a tag
    pub fn create(
        &self,
        tag: &str,
        services: &ExecutorServices,
    ) -> Result<Arc<dyn NodeExecutor>, FlowError> {
        let factory = self
            .factories
            .get(&normalize_tag(tag))
            .ok_or_else(|| FlowError::UnknownNodeType(tag.to_string()))?;
        Ok(factory(services))
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.factories.keys().cloned().collect();
        tags.sort();
        tags
    }
}
