// SPDX-License-Identifier: MIT

//! Model module - chat model trait and shared message types
//!
//! Agent and llm nodes only need "system text + message history in,
//! assistant text out". Implementations live in their own submodules:
//! - [openai] - OpenAI-compatible chat completions API

pub mod openai;

use crate::adk::error::FlowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A single completion request
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model name; the implementation's default is used when absent
    pub model: Option<String>,
    /// System instructions, sent ahead of the history
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

/// Core trait for chat model implementations
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the assistant text for the request
    async fn complete(&self, request: ChatRequest) -> Result<String, FlowError>;
}
