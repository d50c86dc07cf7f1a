// SPDX-License-Identifier: MIT

//! Agent and llm nodes - the chat model boundary
//!
//! Both node types hand text to the configured [`ChatModel`] and store the
//! reply; neither interprets it.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::adk::model::{ChatMessage, ChatModel, ChatRequest};
use crate::flow::resolver::{resolve_to_string, stringify};
use crate::flow::state::WorkflowState;
use crate::flow::types::NodeDefinition;

static AGENT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string"},
            "messages": {"type": "array"}
        }
    })
});

static LLM_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string"},
            "prompt": {"type": "string"}
        }
    })
});

/// `config.model`
#[derive(Debug, Default, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    code: Option<String>,
}

/// One entry of `config.promptTemplate`
#[derive(Debug, Deserialize)]
struct PromptTemplate {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: Value,
}

fn model_code(node: &NodeDefinition) -> Result<Option<String>, FlowError> {
    let config: ModelConfig = node.config_field("model")?;
    Ok(config.code.filter(|c| !c.trim().is_empty()))
}

fn require_model(model: &Option<Arc<dyn ChatModel>>) -> Result<&Arc<dyn ChatModel>, FlowError> {
    model.as_ref().ok_or(FlowError::ModelUnavailable)
}

/// Conversational node over the message log
pub struct AgentExecutor {
    model: Option<Arc<dyn ChatModel>>,
}

impl AgentExecutor {
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { model }
    }

    fn system_message(node: &NodeDefinition, state: &WorkflowState) -> Result<String, FlowError> {
        let templates: Vec<PromptTemplate> = node.config_field("promptTemplate")?;
        Ok(templates
            .iter()
            .filter(|t| t.role.eq_ignore_ascii_case("system"))
            .map(|t| resolve_to_string(&t.text, state))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn history(state: &WorkflowState) -> Vec<ChatMessage> {
        let messages: Vec<ChatMessage> = state
            .messages()
            .iter()
            .filter_map(|m| {
                let role = m.get("role").and_then(Value::as_str).unwrap_or("user");
                let content = m.get("content").map(stringify).unwrap_or_default();
                match role {
                    "user" | "human" => Some(ChatMessage::user(content)),
                    "assistant" | "ai" => Some(ChatMessage::assistant(content)),
                    _ => None,
                }
            })
            .collect();

        if !messages.is_empty() {
            return messages;
        }

        match state.get_path("system.userQuery").map(stringify) {
            Some(query) if !query.is_empty() => vec![ChatMessage::user(query)],
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl NodeExecutor for AgentExecutor {
    fn output_schema(&self) -> &Value {
        &AGENT_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let model = require_model(&self.model)?;
        let system = Self::system_message(node, &state)?;
        let request = ChatRequest {
            model: model_code(node)?,
            system: Some(system).filter(|s| !s.is_empty()),
            messages: Self::history(&state),
            temperature: Some(0.0),
        };

        log::info!("Agent node '{}' calling model", node.id);
        let text = model.complete(request).await?;

        let reply = json!({ "role": "assistant", "content": text });
        let output = json!({
            "text": text,
            "messages": [reply.clone()],
        });

        let mut state = apply_updates(node, &output, state)?;
        state.push_message(reply);
        Ok(NodeOutcome::new(output, state))
    }
}

/// Single-prompt completion node
pub struct LlmExecutor {
    model: Option<Arc<dyn ChatModel>>,
}

impl LlmExecutor {
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl NodeExecutor for LlmExecutor {
    fn output_schema(&self) -> &Value {
        &LLM_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let model = require_model(&self.model)?;
        let raw_prompt = node.config_value("prompt").cloned().unwrap_or_default();
        let prompt = resolve_to_string(&raw_prompt, &state);

        let request = ChatRequest {
            model: model_code(node)?,
            system: None,
            messages: vec![ChatMessage::user(prompt.clone())],
            temperature: Some(0.0),
        };
        let text = model.complete(request).await?;

        let output = json!({ "text": text, "prompt": prompt });
        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::nodes::test_support::MockModel;
    use crate::flow::state::InitialState;

    fn agent_node() -> NodeDefinition {
        NodeDefinition::new(
            "helper",
            "agent",
            json!({
                "model": {"code": "gpt-4o"},
                "promptTemplate": [
                    {"role": "system", "text": "You help {{flow.customer}}."},
                    {"role": "user", "text": "ignored"},
                    {"role": "system", "text": "Be brief."}
                ],
                "variableUpdates": [
                    {"fieldName": "flow.lastAnswer", "value": "{{nodeOutput.text}}"}
                ]
            }),
        )
    }

    #[tokio::test]
    async fn test_agent_builds_request_and_appends_reply() {
        let model = Arc::new(MockModel::new("Sure thing"));
        let executor = AgentExecutor::new(Some(model.clone()));

        let mut overrides = InitialState::default();
        overrides.flow.insert("customer".into(), json!("Ada"));
        let state = WorkflowState::for_user_query("Where is my order?", overrides);

        let outcome = executor.execute(&agent_node(), state).await.unwrap();
        assert_eq!(outcome.output["text"], "Sure thing");
        assert_eq!(
            outcome.state.get_path("flow.lastAnswer"),
            Some(&json!("Sure thing"))
        );
        assert_eq!(outcome.state.messages().len(), 2);
        assert_eq!(outcome.state.messages()[1]["role"], "assistant");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].model.as_deref(), Some("gpt-4o"));
        assert_eq!(
            requests[0].system.as_deref(),
            Some("You help Ada.\nBe brief.")
        );
        assert_eq!(requests[0].messages, vec![ChatMessage::user("Where is my order?")]);
    }

    #[tokio::test]
    async fn test_agent_falls_back_to_user_query() {
        let model = Arc::new(MockModel::new("ok"));
        let executor = AgentExecutor::new(Some(model.clone()));
        let state = WorkflowState::from_value(json!({"system": {"userQuery": "hi"}}));

        executor.execute(&agent_node(), state).await.unwrap();
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].messages, vec![ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn test_missing_model_is_an_error() {
        let executor = AgentExecutor::new(None);
        let result = executor.execute(&agent_node(), WorkflowState::initial()).await;
        assert!(matches!(result, Err(FlowError::ModelUnavailable)));
    }

    #[tokio::test]
    async fn test_llm_resolves_prompt() {
        let model = Arc::new(MockModel::new("positive"));
        let executor = LlmExecutor::new(Some(model.clone()));
        let node = NodeDefinition::new(
            "classify",
            "llm",
            json!({"prompt": "Classify: {{system.userQuery}}"}),
        );
        let state = WorkflowState::from_value(json!({"system": {"userQuery": "great service"}}));

        let outcome = executor.execute(&node, state).await.unwrap();
        assert_eq!(
            outcome.output,
            json!({"text": "positive", "prompt": "Classify: great service"})
        );
        assert!(requests_empty_system(&model));
    }

    fn requests_empty_system(model: &MockModel) -> bool {
        model.requests.lock().unwrap()[0].system.is_none()
    }
}
