use dashmap::DashMap;
use ragcrust_common::{Result, SessionKey};

use crate::knowledge_base::{IndexMapStore, KnowledgeBaseHandle};
use crate::records::{FileRecordStore, UploadedFileRecord};

/// Process-local store for both maps. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    indexes: DashMap<SessionKey, KnowledgeBaseHandle>,
    files: DashMap<String, UploadedFileRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexMapStore for InMemoryStore {
    fn get(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>> {
        Ok(self.indexes.get(session_key).map(|entry| entry.value().clone()))
    }

    fn put(&self, handle: KnowledgeBaseHandle) -> Result<()> {
        self.indexes.insert(handle.session_key.clone(), handle);
        Ok(())
    }

    fn remove(&self, session_key: &SessionKey) -> Result<Option<KnowledgeBaseHandle>> {
        Ok(self.indexes.remove(session_key).map(|(_, handle)| handle))
    }

    fn list(&self) -> Result<Vec<KnowledgeBaseHandle>> {
        let mut handles: Vec<_> = self.indexes.iter().map(|e| e.value().clone()).collect();
        handles.sort_by(|a, b| a.session_key.cmp(&b.session_key));
        Ok(handles)
    }
}

impl FileRecordStore for InMemoryStore {
    fn insert(&self, record: UploadedFileRecord) -> Result<()> {
        self.files.insert(record.file_id.clone(), record);
        Ok(())
    }

    fn get(&self, file_id: &str) -> Result<Option<UploadedFileRecord>> {
        Ok(self.files.get(file_id).map(|entry| entry.value().clone()))
    }

    fn remove(&self, file_id: &str) -> Result<Option<UploadedFileRecord>> {
        Ok(self.files.remove(file_id).map(|(_, record)| record))
    }

    fn list(&self) -> Result<Vec<UploadedFileRecord>> {
        let mut records: Vec<_> = self.files.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        Ok(records)
    }

    fn remove_for_session(&self, session_key: &SessionKey) -> Result<usize> {
        let before = self.files.len();
        self.files.retain(|_, record| &record.session_key != session_key);
        Ok(before.saturating_sub(self.files.len()))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.files.len())
    }
}
