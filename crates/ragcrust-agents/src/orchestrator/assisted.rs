use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::GenerationPlan;
use super::emitter::FragmentSink;
use super::tier::{Tier, TierFailure, TierKind, TierSuccess};
use crate::providers::{AssistantSpec, MessageRole, ModelBackend, RunStatus};

/// Ephemeral assistant run with the referenced files attached to the user turn.
pub(crate) struct AssistedTier {
    model: String,
    instructions: String,
    poll_interval: Duration,
    run_timeout: Duration,
}

impl AssistedTier {
    pub(crate) fn new(
        model: impl Into<String>,
        instructions: impl Into<String>,
        poll_interval: Duration,
        run_timeout: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            instructions: instructions.into(),
            poll_interval,
            run_timeout,
        }
    }

    async fn converse(
        &self,
        backend: &Arc<dyn ModelBackend>,
        assistant_id: &str,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> Result<(), TierFailure> {
        let thread_id = backend
            .create_thread()
            .await
            .map_err(TierFailure::unavailable)?;
        backend
            .post_message(&thread_id, &plan.message, &plan.file_ids)
            .await
            .map_err(TierFailure::unavailable)?;

        let deadline = Instant::now() + self.run_timeout;
        let mut run = backend
            .create_run(&thread_id, assistant_id)
            .await
            .map_err(TierFailure::unavailable)?;

        while !run.status.is_terminal() {
            if sink.is_closed() {
                return Err(TierFailure::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(TierFailure::Unavailable(format!(
                    "assistant run {} still {} after {}s",
                    run.id,
                    run.status,
                    self.run_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            run = backend
                .retrieve_run(&thread_id, &run.id)
                .await
                .map_err(TierFailure::unavailable)?;
            debug!(run = %run.id, status = %run.status, "assistant run polled");
        }

        if run.status != RunStatus::Completed {
            return Err(TierFailure::Unavailable(format!(
                "assistant run failed with status: {}",
                run.status
            )));
        }

        let messages = backend
            .list_messages(&thread_id)
            .await
            .map_err(TierFailure::unavailable)?;
        let answer = messages
            .iter()
            .find(|m| m.role == MessageRole::Assistant)
            .and_then(|m| m.first_text())
            .ok_or(TierFailure::NoOutput)?;

        sink.send(answer.to_string()).await
    }
}

#[async_trait]
impl Tier for AssistedTier {
    fn kind(&self) -> TierKind {
        TierKind::Assisted
    }

    fn applies_to(&self, plan: &GenerationPlan) -> bool {
        !plan.file_ids.is_empty()
    }

    async fn attempt(
        &self,
        backend: &Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> Result<TierSuccess, TierFailure> {
        let assistant_id = backend
            .create_assistant(&AssistantSpec {
                model: self.model.clone(),
                instructions: self.instructions.clone(),
            })
            .await
            .map_err(TierFailure::unavailable)?;

        let mut guard = AssistantGuard::new(Arc::clone(backend), assistant_id);
        let outcome = self.converse(backend, guard.id(), plan, sink).await;
        guard.release().await;

        outcome.map(|()| TierSuccess {
            model: self.model.clone(),
            interrupted: None,
        })
    }
}

/// Deletes the ephemeral assistant. If the attempt is dropped mid-flight the
/// delete is spawned instead.
struct AssistantGuard {
    backend: Arc<dyn ModelBackend>,
    id: Option<String>,
}

impl AssistantGuard {
    fn new(backend: Arc<dyn ModelBackend>, id: String) -> Self {
        Self {
            backend,
            id: Some(id),
        }
    }

    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    async fn release(&mut self) {
        if let Some(id) = self.id.take() {
            teardown(self.backend.as_ref(), &id).await;
        }
    }
}

impl Drop for AssistantGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                teardown(backend.as_ref(), &id).await;
            });
        }
    }
}

async fn teardown(backend: &dyn ModelBackend, assistant_id: &str) {
    if let Err(e) = backend.delete_assistant(assistant_id).await {
        warn!(assistant = %assistant_id, "failed to delete ephemeral assistant: {e}");
    }
}
