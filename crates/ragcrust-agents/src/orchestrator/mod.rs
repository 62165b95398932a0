//! Tiered reply generation.
//!
//! A request is resolved once into a [`GenerationPlan`], then the tiers are
//! tried strictly in order: rich (responses endpoint), assisted (ephemeral
//! assistant with file attachments), completion (plain chat with model
//! fallback). The first tier that produces output wins and nothing from a
//! failed tier ever reaches the caller. When every tier fails the stream ends
//! with one `Error: ...` fragment instead of a transport fault.

mod assisted;
mod completion;
mod emitter;
mod rich;
mod tier;

use std::sync::Arc;
use std::time::Duration;

use ragcrust_common::{GenerationRequest, ReasoningEffort, Result};
use ragcrust_config::GenerationConfig;
use ragcrust_db::FileRecordStore;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::providers::ModelBackend;
use assisted::AssistedTier;
use completion::CompletionTier;
use emitter::FragmentSink;
use rich::RichTier;
use tier::{Tier, TierFailure, TierSuccess};

pub use tier::TierKind;

/// Everything decided before the first provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    /// User message, already carrying any research brief.
    pub message: String,
    pub model: String,
    pub file_ids: Vec<String>,
    pub reasoning_effort: ReasoningEffort,
    /// Index bound to the file search tool. Only the first referenced file
    /// with an index counts.
    pub retrieval: Option<String>,
    pub rich_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    Skipped,
    Cancelled,
}

/// Diagnostics for one tier. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationAttempt {
    pub tier: TierKind,
    pub model: Option<String>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub attempts: Vec<GenerationAttempt>,
    pub winner: Option<TierKind>,
    pub model: Option<String>,
    /// Fragments delivered to the caller, including a trailing error line.
    pub fragments: usize,
    pub cancelled: bool,
    pub timed_out: bool,
}

impl GenerationReport {
    /// Tiers that were actually tried, in order.
    pub fn attempted(&self) -> Vec<TierKind> {
        self.attempts
            .iter()
            .filter(|a| a.outcome != AttemptOutcome::Skipped)
            .map(|a| a.tier)
            .collect()
    }

    fn record(&mut self, tier: TierKind, model: Option<String>, outcome: AttemptOutcome) {
        self.attempts.push(GenerationAttempt {
            tier,
            model,
            outcome,
        });
    }
}

pub struct Orchestrator {
    tiers: Vec<Box<dyn Tier>>,
    rich_models: Vec<String>,
    tier_timeout: Duration,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn from_config(config: &GenerationConfig, stream_responses: bool) -> Self {
        let tiers: Vec<Box<dyn Tier>> = vec![
            Box::new(RichTier::new(config.instructions.clone(), stream_responses)),
            Box::new(AssistedTier::new(
                config.assistant_model.clone(),
                config.assistant_instructions.clone(),
                config.run_poll_interval(),
                config.run_timeout(),
            )),
            Box::new(CompletionTier::new(
                config.fallback_models.clone(),
                config.system_prompt.clone(),
            )),
        ];
        Self {
            tiers,
            rich_models: config.rich_models.clone(),
            tier_timeout: config.tier_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn is_rich_model(&self, model: &str) -> bool {
        self.rich_models.iter().any(|m| m == model)
    }

    /// Resolve the retrieval binding and tier eligibility for `request`.
    /// `message` replaces the request text (e.g. with a research brief).
    pub fn plan(
        &self,
        request: &GenerationRequest,
        message: String,
        records: &dyn FileRecordStore,
    ) -> Result<GenerationPlan> {
        let mut retrieval = None;
        for file_id in &request.file_ids {
            if let Some(index) = records.get(file_id)?.and_then(|r| r.knowledge_base_id) {
                retrieval = Some(index);
                break;
            }
        }
        if let Some(index) = &retrieval {
            debug!(index = %index, "file search bound to knowledge base");
        }

        Ok(GenerationPlan {
            message,
            model: request.model.clone(),
            file_ids: request.file_ids.clone(),
            reasoning_effort: request.reasoning_effort,
            retrieval,
            rich_eligible: self.is_rich_model(&request.model),
        })
    }

    /// Run the cascade, pushing fragments into `tx`. Dropping the receiver
    /// abandons the in-flight tier.
    #[instrument(skip_all, fields(model = %plan.model, files = plan.file_ids.len()))]
    pub async fn run(
        &self,
        backend: Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        tx: mpsc::Sender<String>,
    ) -> GenerationReport {
        let deadline = Instant::now() + self.request_timeout;
        let watcher = tx.clone();
        let mut sink = FragmentSink::new(tx);
        let mut report = GenerationReport::default();
        let mut last_error: Option<String> = None;

        let last = self.tiers.len().saturating_sub(1);
        for (index, tier) in self.tiers.iter().enumerate() {
            let kind = tier.kind();
            if !tier.applies_to(plan) {
                debug!(tier = %kind, "tier not applicable, skipping");
                report.record(kind, None, AttemptOutcome::Skipped);
                continue;
            }

            info!(tier = %kind, "attempting generation tier");
            // The last tier has nothing to fall back to, so only the request
            // deadline bounds it.
            let budget = (index < last).then_some(self.tier_timeout);
            let result = tokio::select! {
                biased;
                _ = watcher.closed() => Err(TierFailure::Cancelled),
                r = tokio::time::timeout_at(
                    deadline,
                    Self::attempt_within(tier.as_ref(), budget, &backend, plan, &mut sink),
                ) => {
                    r.unwrap_or(Err(TierFailure::TimedOut))
                }
            };

            match result {
                Ok(success) => {
                    info!(tier = %kind, model = %success.model, "generation tier succeeded");
                    report.record(kind, Some(success.model.clone()), AttemptOutcome::Succeeded);
                    report.winner = Some(kind);
                    report.model = Some(success.model);
                    if let Some(err) = success.interrupted {
                        warn!(tier = %kind, "stream interrupted after output: {err}");
                        if sink.send(format!("\nError: {err}")).await.is_err() {
                            report.cancelled = true;
                        }
                    }
                    report.fragments = sink.emitted();
                    return report;
                }
                Err(TierFailure::Cancelled) => {
                    info!(tier = %kind, "caller disconnected, abandoning generation");
                    report.record(kind, None, AttemptOutcome::Cancelled);
                    report.cancelled = true;
                    report.fragments = sink.emitted();
                    return report;
                }
                Err(TierFailure::TimedOut) => {
                    let secs = self.request_timeout.as_secs();
                    warn!(tier = %kind, timeout_secs = secs, "generation timed out");
                    report.record(kind, None, AttemptOutcome::Failed("timed out".to_string()));
                    report.timed_out = true;
                    let prefix = if sink.emitted() > 0 { "\n" } else { "" };
                    if sink
                        .send(format!("{prefix}Error: generation timed out after {secs}s"))
                        .await
                        .is_err()
                    {
                        report.cancelled = true;
                    }
                    report.fragments = sink.emitted();
                    return report;
                }
                Err(e) => {
                    warn!(tier = %kind, "generation tier failed: {e}");
                    report.record(kind, None, AttemptOutcome::Failed(e.to_string()));
                    last_error = Some(e.to_string());
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| "no generation tier applied".to_string());
        warn!("all generation tiers failed: {last_error}");
        if sink
            .send(format!("Error: All models failed. Last error: {last_error}"))
            .await
            .is_err()
        {
            report.cancelled = true;
        }
        report.fragments = sink.emitted();
        report
    }

    /// Run one tier, bounded by `budget` when given. A tier that runs out of
    /// budget before emitting anything has failed; one that already emitted
    /// is committed and reported as interrupted.
    async fn attempt_within(
        tier: &dyn Tier,
        budget: Option<Duration>,
        backend: &Arc<dyn ModelBackend>,
        plan: &GenerationPlan,
        sink: &mut FragmentSink,
    ) -> std::result::Result<TierSuccess, TierFailure> {
        let Some(budget) = budget else {
            return tier.attempt(backend, plan, sink).await;
        };
        let start = sink.emitted();
        match tokio::time::timeout(budget, tier.attempt(backend, plan, sink)).await {
            Ok(result) => result,
            Err(_) => {
                let reason = format!("{} tier timed out after {}s", tier.kind(), budget.as_secs());
                if sink.emitted() > start {
                    Ok(TierSuccess {
                        model: plan.model.clone(),
                        interrupted: Some(reason),
                    })
                } else {
                    Err(TierFailure::Unavailable(reason))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ragcrust_common::SessionKey;
    use ragcrust_db::{InMemoryStore, UploadedFileRecord};

    fn record(file_id: &str, kb: Option<&str>) -> UploadedFileRecord {
        UploadedFileRecord {
            file_id: file_id.to_string(),
            name: format!("{file_id}.txt"),
            size: 1,
            content_type: None,
            knowledge_base_id: kb.map(String::from),
            session_key: SessionKey::new("ABCDEFGH"),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn plan_binds_first_file_with_an_index() {
        let orchestrator = Orchestrator::from_config(&GenerationConfig::default(), false);
        let records = InMemoryStore::new();
        records.insert(record("file-a", None)).unwrap();
        records.insert(record("file-b", Some("vs_b"))).unwrap();
        records.insert(record("file-c", Some("vs_c"))).unwrap();

        let request = GenerationRequest::new("q", "gpt-4o").with_files(vec![
            "unknown".into(),
            "file-a".into(),
            "file-b".into(),
            "file-c".into(),
        ]);
        let plan = orchestrator.plan(&request, "q".into(), &records).unwrap();
        assert_eq!(plan.retrieval.as_deref(), Some("vs_b"));
        assert!(plan.rich_eligible);
        assert_eq!(plan.file_ids.len(), 4);
    }

    #[test]
    fn plan_marks_unlisted_models_ineligible() {
        let orchestrator = Orchestrator::from_config(&GenerationConfig::default(), false);
        let request = GenerationRequest::new("q", "gpt-3.5-turbo");
        let plan = orchestrator
            .plan(&request, "q".into(), &InMemoryStore::new())
            .unwrap();
        assert!(!plan.rich_eligible);
        assert!(plan.retrieval.is_none());
    }

    #[test]
    fn attempted_ignores_skipped_tiers() {
        let mut report = GenerationReport::default();
        report.record(TierKind::Rich, None, AttemptOutcome::Failed("x".into()));
        report.record(TierKind::Assisted, None, AttemptOutcome::Skipped);
        report.record(TierKind::Completion, Some("gpt-5".into()), AttemptOutcome::Succeeded);
        assert_eq!(report.attempted(), vec![TierKind::Rich, TierKind::Completion]);
    }
}
