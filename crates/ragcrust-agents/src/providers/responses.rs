use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use ragcrust_common::{ReasoningEffort, Result};
use serde::Serialize;

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Unified generation endpoint (OpenAI `/responses`).
#[async_trait]
pub trait ResponsesApi: Send + Sync {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseOutput>;
}

#[derive(Debug, Clone)]
pub struct ResponseRequest {
    pub model: String,
    pub input: String,
    pub instructions: Option<String>,
    pub reasoning_effort: ReasoningEffort,
    pub tools: Vec<ResponseTool>,
    /// Request incremental deltas instead of one payload.
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseTool {
    FileSearch { vector_store_ids: Vec<String> },
}

impl ResponseTool {
    pub fn file_search(vector_store_id: impl Into<String>) -> Self {
        Self::FileSearch {
            vector_store_ids: vec![vector_store_id.into()],
        }
    }
}

pub enum ResponseOutput {
    /// The whole answer in one payload.
    Text(String),
    /// Text deltas in production order.
    Stream(TextStream),
}

impl std::fmt::Debug for ResponseOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
