use std::sync::Arc;

use futures::future::join_all;
use ragcrust_common::{Error, GenerationRequest, Result, SessionKey};
use ragcrust_config::AppConfig;
use ragcrust_db::{FileRecordStore, IndexMapStore, KnowledgeBaseHandle, UploadedFileRecord};
use ragcrust_security::{SessionKeyResolver, mask_credential};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ingest::{ClearSessionReport, FileIngestionService, KnowledgeBaseOverview};
use crate::knowledge::KnowledgeBaseCache;
use crate::orchestrator::{GenerationReport, Orchestrator};
use crate::providers::{BackendFactory, ModelBackend};
use crate::research::{ResearchAugmenter, ResearchReport};

/// Fragments buffered between the generation task and the transport.
const REPLY_BUFFER: usize = 1;

/// Live reply: fragments in production order, then the generation report.
pub struct ReplyStream {
    rx: mpsc::Receiver<String>,
    handle: JoinHandle<GenerationReport>,
}

impl ReplyStream {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Split into the fragment receiver and the task producing it. Dropping
    /// the receiver cancels generation.
    pub fn into_parts(self) -> (mpsc::Receiver<String>, JoinHandle<GenerationReport>) {
        (self.rx, self.handle)
    }

    /// Drain every fragment and wait for the report.
    pub async fn collect(mut self) -> (Vec<String>, Option<GenerationReport>) {
        let mut fragments = Vec::new();
        while let Some(fragment) = self.rx.recv().await {
            fragments.push(fragment);
        }
        let report = match self.handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("generation task failed: {e}");
                None
            }
        };
        (fragments, report)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub responses_api: &'static str,
    pub research: &'static str,
    pub file_upload: &'static str,
    pub vector_stores: &'static str,
    pub active_vector_stores: usize,
    pub uploaded_files: usize,
}

/// Entry point for every chat-facing operation: reply generation, file
/// ingestion, session clearing and research.
pub struct ChatRuntime {
    factory: Arc<dyn BackendFactory>,
    fallback_credential: Option<String>,
    resolver: SessionKeyResolver,
    cache: Arc<KnowledgeBaseCache>,
    ingestion: FileIngestionService,
    records: Arc<dyn FileRecordStore>,
    research: Arc<ResearchAugmenter>,
    orchestrator: Arc<Orchestrator>,
    default_model: String,
}

impl ChatRuntime {
    pub fn new(
        config: &AppConfig,
        factory: Arc<dyn BackendFactory>,
        index_store: Arc<dyn IndexMapStore>,
        records: Arc<dyn FileRecordStore>,
    ) -> Self {
        let cache = Arc::new(KnowledgeBaseCache::new(
            index_store,
            config.session.index_name_prefix.clone(),
        ));
        let ingestion = FileIngestionService::new(Arc::clone(&cache), Arc::clone(&records));
        Self {
            factory,
            fallback_credential: None,
            resolver: SessionKeyResolver::new(config.session.key_length),
            cache,
            ingestion,
            records,
            research: Arc::new(ResearchAugmenter::new(&config.research)),
            orchestrator: Arc::new(Orchestrator::from_config(
                &config.generation,
                config.provider.stream_responses,
            )),
            default_model: config.generation.default_model.clone(),
        }
    }

    /// Credential used when a request carries none.
    pub fn with_fallback_credential(mut self, credential: Option<String>) -> Self {
        self.fallback_credential = credential
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn credential<'a>(&'a self, credential: Option<&'a str>) -> Result<&'a str> {
        credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or(self.fallback_credential.as_deref())
            .ok_or_else(|| {
                Error::Config("no API key provided and no default key configured".to_string())
            })
    }

    fn backend(&self, credential: &str) -> Result<Arc<dyn ModelBackend>> {
        self.factory.backend(credential)
    }

    pub fn session_key(&self, credential: Option<&str>) -> Result<SessionKey> {
        Ok(self.resolver.resolve(self.credential(credential)?))
    }

    /// Start generating a reply. Fails up front only on a missing credential;
    /// every later failure arrives in-band as a final `Error: ...` fragment.
    pub fn generate_reply(
        &self,
        credential: Option<&str>,
        mut request: GenerationRequest,
    ) -> Result<ReplyStream> {
        let credential = self.credential(credential)?;
        let backend = self.backend(credential)?;
        if request.model.trim().is_empty() {
            request.model = self.default_model.clone();
        }
        info!(
            request_id = %request.id,
            model = %request.model,
            files = request.file_ids.len(),
            research = request.use_research,
            credential = %mask_credential(credential),
            "generating reply"
        );

        let (tx, rx) = mpsc::channel(REPLY_BUFFER);
        let orchestrator = Arc::clone(&self.orchestrator);
        let research = Arc::clone(&self.research);
        let records = Arc::clone(&self.records);

        let handle = tokio::spawn(async move {
            let mut message = request.message.clone();
            if request.use_research {
                let brief = research.augment(backend.as_ref(), &request.message).await;
                message = ResearchAugmenter::append_brief(&message, &brief);
            }

            let plan = match orchestrator.plan(&request, message, records.as_ref()) {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(request_id = %request.id, "failed to plan generation: {e}");
                    let delivered = tx.send(format!("Error: {e}")).await.is_ok();
                    return GenerationReport {
                        fragments: usize::from(delivered),
                        cancelled: !delivered,
                        ..Default::default()
                    };
                }
            };

            orchestrator.run(backend, &plan, tx).await
        });

        Ok(ReplyStream { rx, handle })
    }

    pub async fn ingest_file(
        &self,
        credential: Option<&str>,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<UploadedFileRecord> {
        let credential = self.credential(credential)?;
        let backend = self.backend(credential)?;
        let session_key = self.resolver.resolve(credential);
        self.ingestion
            .ingest(backend.as_ref(), &session_key, bytes, file_name, content_type)
            .await
    }

    /// Live knowledge base for the caller's session, created if needed.
    pub async fn knowledge_base(&self, credential: Option<&str>) -> Result<KnowledgeBaseHandle> {
        let credential = self.credential(credential)?;
        let backend = self.backend(credential)?;
        let session_key = self.resolver.resolve(credential);
        self.cache.get_or_create(backend.as_ref(), &session_key).await
    }

    pub async fn clear_session(&self, credential: Option<&str>) -> Result<ClearSessionReport> {
        let credential = self.credential(credential)?;
        let backend = self.backend(credential)?;
        let session_key = self.resolver.resolve(credential);
        self.ingestion
            .clear_session(backend.as_ref(), &session_key)
            .await
    }

    pub fn remove_file(&self, file_id: &str) -> Result<UploadedFileRecord> {
        self.ingestion.remove_file(file_id)
    }

    pub fn list_files(&self) -> Result<Vec<UploadedFileRecord>> {
        self.ingestion.list_files()
    }

    pub fn vector_stores(&self) -> Result<KnowledgeBaseOverview> {
        self.ingestion.overview()
    }

    pub async fn research(&self, credential: Option<&str>, query: &str) -> Result<ResearchReport> {
        let credential = self.credential(credential)?;
        let backend = self.backend(credential)?;
        self.research.research(backend.as_ref(), query).await
    }

    pub fn health(&self) -> Result<HealthReport> {
        Ok(HealthReport {
            status: "ok",
            responses_api: "enabled",
            research: "enabled",
            file_upload: "enabled",
            vector_stores: "enabled",
            active_vector_stores: self.cache.handles()?.len(),
            uploaded_files: self.records.count()?,
        })
    }

    /// Probe the provider with each credential concurrently.
    pub async fn check_credentials(&self, credentials: &[&str]) -> Vec<(String, bool)> {
        let checks = credentials.iter().map(|credential| async move {
            let healthy = match self.backend(credential) {
                Ok(backend) => backend.health_check().await.unwrap_or(false),
                Err(_) => false,
            };
            (mask_credential(credential), healthy)
        });
        join_all(checks).await
    }
}
