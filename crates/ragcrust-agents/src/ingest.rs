use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use ragcrust_common::{Error, Result, SessionKey};
use ragcrust_db::{FileRecordStore, UploadedFileRecord};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::knowledge::KnowledgeBaseCache;
use crate::providers::{FileStore, VectorIndex};

/// Outcome of clearing one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearSessionReport {
    pub files_removed: usize,
    /// True when the session had a cached knowledge base, whether or not the
    /// provider-side delete succeeded.
    pub vector_store_cleared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMapping {
    pub name: String,
    pub vector_store_id: Option<String>,
}

/// Diagnostic view of every cached index and file → index binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeBaseOverview {
    pub vector_stores: BTreeMap<String, String>,
    pub file_mappings: BTreeMap<String, FileMapping>,
}

/// Uploads files, binds them to the session's knowledge base and keeps the
/// only writable copy of the uploaded file records.
pub struct FileIngestionService {
    cache: Arc<KnowledgeBaseCache>,
    records: Arc<dyn FileRecordStore>,
}

impl FileIngestionService {
    pub fn new(cache: Arc<KnowledgeBaseCache>, records: Arc<dyn FileRecordStore>) -> Self {
        Self { cache, records }
    }

    #[instrument(skip(self, provider, bytes), fields(size = bytes.len()))]
    pub async fn ingest<P>(
        &self,
        provider: &P,
        session_key: &SessionKey,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<UploadedFileRecord>
    where
        P: FileStore + VectorIndex + ?Sized,
    {
        let size = bytes.len() as u64;
        let file_id = provider
            .upload_file(bytes, file_name, content_type)
            .await?;
        info!(file_id = %file_id, "file uploaded to provider");

        let handle = self.cache.get_or_create(provider, session_key).await?;

        let knowledge_base_id = match provider.attach_file(&handle.id, &file_id).await {
            Ok(()) => Some(handle.id),
            Err(e) => {
                warn!(
                    file_id = %file_id,
                    index = %handle.id,
                    "file stored but not attached to knowledge base: {e}"
                );
                None
            }
        };

        let record = UploadedFileRecord {
            file_id,
            name: file_name.to_string(),
            size,
            content_type: content_type.map(String::from),
            knowledge_base_id,
            session_key: session_key.clone(),
            uploaded_at: Utc::now(),
        };
        self.records.insert(record.clone())?;
        Ok(record)
    }

    /// Forget a file's metadata. The provider copy is left in place.
    pub fn remove_file(&self, file_id: &str) -> Result<UploadedFileRecord> {
        let removed = self
            .records
            .remove(file_id)?
            .ok_or_else(|| Error::NotFound(format!("file {file_id} not found")))?;
        info!(file_id, "file record removed");
        Ok(removed)
    }

    pub fn list_files(&self) -> Result<Vec<UploadedFileRecord>> {
        self.records.list()
    }

    #[instrument(skip(self, provider))]
    pub async fn clear_session<P>(
        &self,
        provider: &P,
        session_key: &SessionKey,
    ) -> Result<ClearSessionReport>
    where
        P: VectorIndex + ?Sized,
    {
        let vector_store_cleared = self.cache.invalidate(provider, session_key).await?;
        let files_removed = self.records.remove_for_session(session_key)?;
        info!(files_removed, vector_store_cleared, "session cleared");
        Ok(ClearSessionReport {
            files_removed,
            vector_store_cleared,
        })
    }

    pub fn overview(&self) -> Result<KnowledgeBaseOverview> {
        let vector_stores = self
            .cache
            .handles()?
            .into_iter()
            .map(|h| (h.session_key.to_string(), h.id))
            .collect();
        let file_mappings = self
            .records
            .list()?
            .into_iter()
            .map(|r| {
                (
                    r.file_id,
                    FileMapping {
                        name: r.name,
                        vector_store_id: r.knowledge_base_id,
                    },
                )
            })
            .collect();
        Ok(KnowledgeBaseOverview {
            vector_stores,
            file_mappings,
        })
    }
}
