use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use ragcrust_common::Result;
use serde::{Deserialize, Serialize};

pub mod assistants;
pub mod files;
pub mod responses;

pub use assistants::{AssistantSpec, AssistantsApi, MessageRole, Run, RunStatus, ThreadMessage};
pub use files::{FileStore, VectorIndex, VectorStoreInfo};
pub use responses::{ResponseOutput, ResponseRequest, ResponseTool, ResponsesApi, TextStream};

/// Plain chat completion surface (OpenAI `/chat/completions` and compatibles).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn provider_id(&self) -> &str;

    /// Send a completion request and return the response.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Send a streaming completion request and return a stream of response chunks.
    async fn complete_stream(&self, request: &LlmRequest) -> Result<LlmStream>;

    /// Check if the provider is available and configured.
    async fn health_check(&self) -> Result<bool>;
}

/// Everything the orchestrator needs from one provider account.
pub trait ModelBackend: LlmProvider + FileStore + VectorIndex + ResponsesApi + AssistantsApi {}

impl<T> ModelBackend for T where
    T: LlmProvider + FileStore + VectorIndex + ResponsesApi + AssistantsApi + ?Sized
{
}

/// Builds a backend bound to a caller credential.
pub trait BackendFactory: Send + Sync {
    fn backend(&self, credential: &str) -> Result<Arc<dyn ModelBackend>>;
}

pub type LlmStream = Pin<Box<dyn Stream<Item = Result<LlmStreamResponse>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl LlmRequest {
    /// A single user turn under an optional system instruction.
    pub fn single_turn(
        model: impl Into<String>,
        system: Option<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(user_content)],
            system,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamResponse {
    pub delta: String,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
