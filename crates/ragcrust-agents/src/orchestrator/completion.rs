use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{info, warn};

use super::GenerationPlan;
use super::emitter::{FragmentSink, forward_stream};
use super::tier::{Tier, TierFailure, TierKind, TierSuccess};
use crate::providers::{LlmRequest, ModelBackend};

/// Streaming chat completion, trying the requested model and then each
/// fallback model once.
pub(crate) struct CompletionTier {
    fallback_models: Vec<String>,
    system_prompt: String,
}

impl CompletionTier {
    pub(crate) fn new(fallback_models: Vec<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            fallback_models,
            system_prompt: system_prompt.into(),
        }
    }

    /// Requested model first, then fallbacks, without repeats.
    pub(crate) fn candidates(&self, requested: &str) -> Vec<String> {
        let mut models: Vec<String> = Vec::with_capacity(self.fallback_models.len() + 1);
        for model in std::iter::once(requested).chain(self.fallback_models.iter().map(String::as_str)) {
            if !model.is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        models
    }
}

#[async_trait]
impl Tier for CompletionTier {
    fn kind(&self) -> TierKind {
        TierKind::Completion
    }

    fn applies_to(&self, _plan: &GenerationPlan) -> bool {
        true
    }

    async fn attempt(
        &self,
        backend: &Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> Result<TierSuccess, TierFailure> {
        let mut last_error = String::from("no candidate models configured");

        for model in self.candidates(&plan.model) {
            let request = LlmRequest::single_turn(
                model.clone(),
                Some(self.system_prompt.clone()),
                plan.message.clone(),
            );

            let stream = match backend.complete_stream(&request).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(model = %model, "chat completion failed: {e}");
                    last_error = e.to_string();
                    continue;
                }
            };

            let deltas = stream.map(|chunk| chunk.map(|c| c.delta));
            match forward_stream(deltas, sink).await {
                Ok(interrupted) => {
                    info!(model = %model, "chat completion streamed");
                    return Ok(TierSuccess { model, interrupted });
                }
                Err(TierFailure::Cancelled) => return Err(TierFailure::Cancelled),
                Err(e) => {
                    warn!(model = %model, "chat completion failed: {e}");
                    last_error = e.to_string();
                }
            }
        }

        Err(TierFailure::Unavailable(last_error))
    }
}
