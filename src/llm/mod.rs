//! The LLM Bridge (C7, part 1): `chat`/`stream_chat`/`chat_with_tools` over a
//! remote streaming JSON endpoint.

mod stream;
mod wire;

pub use stream::OpenAiCompatibleBridge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::tools::{ToolMetadata, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Message { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub enum ResponseFormat {
    FreeText,
    JsonObject,
    JsonSchema { name: String, strict: bool, schema: serde_json::Value },
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::FreeText
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub top_p: Option<f32>,
    pub response_format: ResponseFormat,
    pub max_tool_iterations: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ChatResult {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolChatResult {
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: Option<TokenUsage>,
}

/// One text fragment of a `stream_chat` exchange.
pub type TextFragment = String;

#[async_trait]
pub trait LlmBridge: Send + Sync {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResult>;

    async fn stream_chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<tokio::sync::mpsc::Receiver<TextFragment>>;

    /// The streaming tool-calling exchange. `registry` is consulted synchronously
    /// for every tool-invocation event the model streams.
    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tool_declarations: &[ToolMetadata],
        registry: Arc<ToolRegistry>,
        options: &ChatOptions,
    ) -> Result<ToolChatResult>;
}
