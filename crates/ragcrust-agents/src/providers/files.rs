use async_trait::async_trait;
use ragcrust_common::Result;
use serde::{Deserialize, Serialize};

/// Provider file storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload raw bytes and return the provider-assigned file id.
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<String>;
}

/// Provider retrieval indexes ("vector stores").
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStoreInfo>;

    /// Fails with `Error::NotFound` when the index no longer exists.
    async fn retrieve_vector_store(&self, id: &str) -> Result<VectorStoreInfo>;

    async fn attach_file(&self, vector_store_id: &str, file_id: &str) -> Result<()>;

    async fn delete_vector_store(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStoreInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
