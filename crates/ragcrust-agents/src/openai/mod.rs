use std::sync::Arc;

use ragcrust_common::{Error, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::providers::{BackendFactory, ModelBackend};

mod assistants;
mod chat;
mod files;
mod responses;
mod sse;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA: &str = "assistants=v2";

/// OpenAI REST client implementing every provider surface.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_client(Client::new(), api_key, base_url)
    }

    pub fn with_client(client: Client, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            api_key,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.api_key)
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client
            .delete(self.url(path))
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("{context} request failed: {e}")))?;
        check_status(response, context).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self.send(request, context).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse {context} response: {e}")))
    }
}

async fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("{context}: {body}")));
    }
    Err(Error::Provider(format!(
        "{context} failed: status={}, body={}",
        status.as_u16(),
        body
    )))
}

/// Creates one [`OpenAiProvider`] per caller credential over a shared
/// connection pool.
pub struct OpenAiBackendFactory {
    client: Client,
    base_url: String,
}

impl OpenAiBackendFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl BackendFactory for OpenAiBackendFactory {
    fn backend(&self, credential: &str) -> Result<Arc<dyn ModelBackend>> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(Error::Config("API key must not be empty".to_string()));
        }
        let provider = OpenAiProvider::with_client(
            self.client.clone(),
            credential.to_string(),
            Some(self.base_url.clone()),
        );
        Ok(Arc::new(provider))
    }
}
