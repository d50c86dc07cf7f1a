// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-flow
//!
//! `CompileError` covers structural problems in a workflow definition and is
//! always fatal to compilation. `FlowError` is the crate-wide error type; node
//! executors return it and the compiled graph contains it at the node boundary.

use thiserror::Error;

/// Top-level error type for kinetic-flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Structural error raised while compiling a workflow
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// A node type tag with no registered executor
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Node configuration could not be interpreted
    #[error("Invalid config for node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    /// Errors from external services (chat model, HTTP endpoint, tools)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// No chat model is configured for agent or llm nodes
    #[error("No chat model configured")]
    ModelUnavailable,

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine routed to a node that is not part of the graph
    #[error("Node '{0}' is not part of the compiled graph")]
    NodeNotFound(String),

    /// An invocation ran more steps than allowed
    #[error("Max steps reached: {limit}")]
    StepLimitExceeded { limit: usize },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Structural errors found while compiling a workflow definition
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// A workflow id could not be resolved by the loader
    #[error("Workflow '{0}' not found")]
    WorkflowNotFound(String),

    /// No edge leaves the start node
    #[error("Workflow '{0}' has no entry point")]
    MissingEntryPoint(String),

    /// A workflow references itself, directly or through other workflows,
    /// while it is still being compiled
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    /// A node type tag with no registered executor
    #[error("Node '{node}' has unknown type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },

    /// Two nodes share the same id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// An edge starts at an id that is neither a node nor a sentinel
    #[error("Edge source '{0}' does not exist")]
    UnknownSource(String),

    /// An edge points at an id that is not a schedulable node
    #[error("Edge '{source_id}' -> '{target}' points at an unknown or unscheduled node")]
    UnknownTarget { source_id: String, target: String },

    /// A node's configuration is malformed in a way routing depends on
    #[error("Invalid config for node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    /// The definition itself is unusable
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),
}

impl FlowError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// True for errors that come from the structure of a definition
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Compile(_))
    }
}

impl From<&str> for FlowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for FlowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message() {
        let err = CompileError::CircularDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_compile_error_is_structural() {
        let err: FlowError = CompileError::WorkflowNotFound("w".into()).into();
        assert!(err.is_structural());
        assert!(!FlowError::other("boom").is_structural());
    }

    #[test]
    fn test_api_error_display() {
        let err = FlowError::api("OpenAI", "rate limited");
        assert_eq!(err.to_string(), "API error from OpenAI: rate limited");
    }
}
