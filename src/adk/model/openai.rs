// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation

use super::{ChatMessage, ChatModel, ChatRequest};
use crate::adk::error::FlowError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat model
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: base_url.into(),
        }
    }

    /// Create a new OpenAIModel from the environment
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn from_env(model_name: impl Into<String>) -> Result<Self, FlowError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| FlowError::config("OPENAI_API_KEY must be set"))?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url, model_name))
    }

    fn message_to_openai(message: &ChatMessage) -> Value {
        let role = match message.role.as_str() {
            "model" | "ai" => "assistant",
            "human" => "user",
            other => other,
        };
        json!({ "role": role, "content": message.content })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().map(Self::message_to_openai));

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model_name),
            "messages": messages
        });
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn parse_response(response: &Value) -> Result<String, FlowError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| FlowError::api("OpenAI", "No choices in response"))?;

        Ok(choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl ChatModel for OpenAIModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, FlowError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.build_body(&request);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(FlowError::api("OpenAI", format!("{}: {}", status, text)));
        }

        let resp_json: Value = resp.json().await?;
        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OpenAIModel {
        OpenAIModel::new("key", DEFAULT_BASE_URL, "gpt-4.1")
    }

    #[test]
    fn test_body_puts_system_first() {
        let request = ChatRequest {
            system: Some("You are helpful".into()),
            messages: vec![ChatMessage::user("Hello")],
            ..Default::default()
        };

        let body = model().build_body(&request);
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_body_skips_empty_system_and_maps_roles() {
        let request = ChatRequest {
            model: Some("gpt-4o".into()),
            system: Some(String::new()),
            messages: vec![ChatMessage::new("model", "earlier answer")],
            temperature: Some(0.0),
        };

        let body = model().build_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, how can I help?"}
            }]
        });

        let text = OpenAIModel::parse_response(&response).unwrap();
        assert_eq!(text, "Hello, how can I help?");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let result = OpenAIModel::parse_response(&json!({"choices": []}));
        assert!(result.is_err());
    }
}
