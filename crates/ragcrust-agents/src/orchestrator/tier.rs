use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::GenerationPlan;
use super::emitter::FragmentSink;
use crate::providers::ModelBackend;

/// The generation surfaces, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Unified responses endpoint with optional file search.
    Rich,
    /// Ephemeral assistant with the referenced files attached.
    Assisted,
    /// Plain streaming chat completion over a model fallback list.
    Completion,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rich => "rich",
            Self::Assisted => "assisted",
            Self::Completion => "completion",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum TierFailure {
    #[error("{0}")]
    Unavailable(String),
    #[error("no output produced")]
    NoOutput,
    #[error("caller disconnected")]
    Cancelled,
    #[error("generation timed out")]
    TimedOut,
}

impl TierFailure {
    pub(crate) fn unavailable(err: impl fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug)]
pub(crate) struct TierSuccess {
    pub(crate) model: String,
    /// Set when the winning stream broke after producing output.
    pub(crate) interrupted: Option<String>,
}

#[async_trait]
pub(crate) trait Tier: Send + Sync {
    fn kind(&self) -> TierKind;

    fn applies_to(&self, plan: &GenerationPlan) -> bool;

    /// Try this tier. Fragments go to `sink` as they are produced; a failed
    /// attempt has emitted nothing.
    async fn attempt(
        &self,
        backend: &Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> Result<TierSuccess, TierFailure>;
}
