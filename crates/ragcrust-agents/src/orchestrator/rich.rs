use std::sync::Arc;

use async_trait::async_trait;

use super::GenerationPlan;
use super::emitter::{FragmentSink, forward_stream};
use super::tier::{Tier, TierFailure, TierKind, TierSuccess};
use crate::providers::{ModelBackend, ResponseOutput, ResponseRequest, ResponseTool};

/// Unified responses endpoint, with file search bound to the plan's index.
pub(crate) struct RichTier {
    instructions: String,
    stream: bool,
}

impl RichTier {
    pub(crate) fn new(instructions: impl Into<String>, stream: bool) -> Self {
        Self {
            instructions: instructions.into(),
            stream,
        }
    }

    fn request(&self, plan: &GenerationPlan) -> ResponseRequest {
        ResponseRequest {
            model: plan.model.clone(),
            input: plan.message.clone(),
            instructions: Some(self.instructions.clone()),
            reasoning_effort: plan.reasoning_effort,
            tools: plan
                .retrieval
                .iter()
                .map(|id| ResponseTool::file_search(id.clone()))
                .collect(),
            stream: self.stream,
        }
    }
}

#[async_trait]
impl Tier for RichTier {
    fn kind(&self) -> TierKind {
        TierKind::Rich
    }

    fn applies_to(&self, plan: &GenerationPlan) -> bool {
        plan.rich_eligible
    }

    async fn attempt(
        &self,
        backend: &Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> Result<TierSuccess, TierFailure> {
        let output = backend
            .create_response(&self.request(plan))
            .await
            .map_err(TierFailure::unavailable)?;

        let interrupted = match output {
            ResponseOutput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(TierFailure::NoOutput);
                }
                sink.send(text).await?;
                None
            }
            ResponseOutput::Stream(stream) => forward_stream(stream, sink).await?,
        };

        Ok(TierSuccess {
            model: plan.model.clone(),
            interrupted,
        })
    }
}
