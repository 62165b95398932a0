use async_trait::async_trait;
use ragcrust_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use super::{ASSISTANTS_BETA, OpenAiProvider};
use crate::providers::{FileStore, VectorIndex, VectorStoreInfo};

#[async_trait]
impl FileStore for OpenAiProvider {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<String> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| Error::Provider(format!("invalid content type: {e}")))?;
        }
        let form = Form::new().text("purpose", "assistants").part("file", part);

        let uploaded: FileObject = self
            .send_json(self.post("files").multipart(form), "file upload")
            .await?;
        Ok(uploaded.id)
    }
}

#[async_trait]
impl VectorIndex for OpenAiProvider {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStoreInfo> {
        self.send_json(
            self.post("vector_stores")
                .header("OpenAI-Beta", ASSISTANTS_BETA)
                .json(&json!({ "name": name })),
            "vector store creation",
        )
        .await
    }

    async fn retrieve_vector_store(&self, id: &str) -> Result<VectorStoreInfo> {
        self.send_json(
            self.get(&format!("vector_stores/{id}"))
                .header("OpenAI-Beta", ASSISTANTS_BETA),
            "vector store retrieval",
        )
        .await
    }

    async fn attach_file(&self, vector_store_id: &str, file_id: &str) -> Result<()> {
        self.send(
            self.post(&format!("vector_stores/{vector_store_id}/files"))
                .header("OpenAI-Beta", ASSISTANTS_BETA)
                .json(&json!({ "file_id": file_id })),
            "vector store file attach",
        )
        .await?;
        Ok(())
    }

    async fn delete_vector_store(&self, id: &str) -> Result<()> {
        self.send(
            self.delete(&format!("vector_stores/{id}"))
                .header("OpenAI-Beta", ASSISTANTS_BETA),
            "vector store deletion",
        )
        .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}
