use chrono::{DateTime, Utc};
use ragcrust_common::{Result, SessionKey};
use serde::{Deserialize, Serialize};

/// Metadata for a file uploaded to the provider's file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    /// Provider-assigned file identifier.
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    /// Index the file was attached to. `None` when attachment failed, in
    /// which case the file is stored but not searchable.
    pub knowledge_base_id: Option<String>,
    pub session_key: SessionKey,
    pub uploaded_at: DateTime<Utc>,
}

/// Keyed by provider file id.
pub trait FileRecordStore: Send + Sync {
    fn insert(&self, record: UploadedFileRecord) -> Result<()>;

    fn get(&self, file_id: &str) -> Result<Option<UploadedFileRecord>>;

    /// Remove one record. Returns the removed record, if it existed.
    fn remove(&self, file_id: &str) -> Result<Option<UploadedFileRecord>>;

    fn list(&self) -> Result<Vec<UploadedFileRecord>>;

    /// Remove every record owned by `session_key`; returns how many were removed.
    fn remove_for_session(&self, session_key: &SessionKey) -> Result<usize>;

    fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }
}
