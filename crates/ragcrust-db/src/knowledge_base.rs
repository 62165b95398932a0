use chrono::{DateTime, Utc};
use ragcrust_common::{Result, SessionKey};
use serde::{Deserialize, Serialize};

/// One provider-side retrieval index owned by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseHandle {
    pub id: String,
    pub session_key: SessionKey,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeBaseHandle {
    pub fn new(id: impl Into<String>, session_key: SessionKey) -> Self {
        Self {
            id: id.into(),
            session_key,
            created_at: Utc::now(),
        }
    }
}

/// Session key → knowledge base handle mapping. Holds at most one handle per
/// session key; `put` replaces any previous entry.
pub trait IndexMapStore: Send + Sync {
    fn get(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>>;

    fn put(&self, handle: KnowledgeBaseHandle) -> Result<()>;

    /// Remove and return the entry for `session_key`, if any.
    fn remove(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>>;

    fn list(&self) -> Result<Vec<KnowledgeBaseHandle>>;
}
