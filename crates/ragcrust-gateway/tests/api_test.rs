use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use ragcrust_agents::{
    AssistantSpec, AssistantsApi, BackendFactory, ChatRuntime, FileStore, LlmProvider, LlmRequest,
    LlmResponse, LlmStream, ModelBackend, ResponseOutput, ResponseRequest, ResponsesApi, Run,
    ThreadMessage, VectorIndex, VectorStoreInfo,
};
use ragcrust_common::{Error, Result};
use ragcrust_config::AppConfig;
use ragcrust_db::InMemoryStore;
use ragcrust_gateway::GatewayServer;
use tokio::net::TcpListener;

const KEY: &str = "sk-proj-xxxxxxxxABCDEFGH";

/// Streams two deltas from the responses endpoint; every other generation
/// surface is unavailable.
#[derive(Default)]
struct StubBackend {
    uploads: AtomicUsize,
    stores: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    fail_attach: AtomicBool,
}

#[async_trait]
impl LlmProvider for StubBackend {
    fn provider_id(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse {
            content: format!("insights on {}", request.messages.len()),
            model: request.model.clone(),
            usage: None,
            stop_reason: Some("stop".into()),
        })
    }

    async fn complete_stream(&self, _request: &LlmRequest) -> Result<LlmStream> {
        Err(Error::Provider("chat unavailable: status=503".into()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[async_trait]
impl FileStore for StubBackend {
    async fn upload_file(
        &self,
        _bytes: Vec<u8>,
        _file_name: &str,
        _content_type: Option<&str>,
    ) -> Result<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("file-{n}"))
    }
}

#[async_trait]
impl VectorIndex for StubBackend {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStoreInfo> {
        let n = self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(VectorStoreInfo {
            id: format!("vs_{n}"),
            name: Some(name.to_string()),
            status: Some("completed".into()),
        })
    }

    async fn retrieve_vector_store(&self, id: &str) -> Result<VectorStoreInfo> {
        Ok(VectorStoreInfo {
            id: id.to_string(),
            name: None,
            status: Some("completed".into()),
        })
    }

    async fn attach_file(&self, _vector_store_id: &str, _file_id: &str) -> Result<()> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(Error::Provider("attach rejected: status=500".into()));
        }
        Ok(())
    }

    async fn delete_vector_store(&self, id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

#[async_trait]
impl ResponsesApi for StubBackend {
    async fn create_response(&self, _request: &ResponseRequest) -> Result<ResponseOutput> {
        let deltas: Vec<Result<String>> = vec![Ok("Hel".into()), Ok("lo".into())];
        Ok(ResponseOutput::Stream(Box::pin(futures::stream::iter(deltas))))
    }
}

#[async_trait]
impl AssistantsApi for StubBackend {
    async fn create_assistant(&self, _spec: &AssistantSpec) -> Result<String> {
        Err(Error::Provider("assistants unavailable: status=503".into()))
    }

    async fn create_thread(&self) -> Result<String> {
        Err(Error::Provider("unreachable".into()))
    }

    async fn post_message(
        &self,
        _thread_id: &str,
        _content: &str,
        _attachments: &[String],
    ) -> Result<String> {
        Err(Error::Provider("unreachable".into()))
    }

    async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run> {
        Err(Error::Provider("unreachable".into()))
    }

    async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run> {
        Err(Error::Provider("unreachable".into()))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
        Ok(Vec::new())
    }

    async fn delete_assistant(&self, _assistant_id: &str) -> Result<()> {
        Ok(())
    }
}

struct StubFactory {
    backend: Arc<StubBackend>,
}

impl BackendFactory for StubFactory {
    fn backend(&self, _credential: &str) -> Result<Arc<dyn ModelBackend>> {
        let backend: Arc<dyn ModelBackend> = self.backend.clone();
        Ok(backend)
    }
}

async fn spawn_gateway() -> (SocketAddr, Arc<StubBackend>) {
    let config = AppConfig::default();
    let backend = Arc::new(StubBackend::default());
    let store = Arc::new(InMemoryStore::new());
    let runtime = ChatRuntime::new(
        &config,
        Arc::new(StubFactory {
            backend: Arc::clone(&backend),
        }),
        store.clone(),
        store,
    );
    let server = GatewayServer::new(config, runtime);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server
            .serve(listener, std::future::pending::<()>())
            .await
            .unwrap();
    });
    (addr, backend)
}

async fn upload(client: &reqwest::Client, addr: SocketAddr, name: &str) -> serde_json::Value {
    let part = reqwest::multipart::Part::bytes(vec![0u8; 500])
        .file_name(name.to_string())
        .mime_str("text/plain")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("api_key", KEY);
    let response = client
        .post(format!("http://{addr}/api/upload-file"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn chat_streams_plain_text_in_order() {
    let (addr, _) = spawn_gateway().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({
            "user_message": "Hi",
            "model": "gpt-5",
            "api_key": KEY,
            "reasoning_effort": "high",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let mut body = String::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        body.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
    }
    assert_eq!(body, "Hello");
}

#[tokio::test]
async fn exhausted_cascade_still_completes_with_200() {
    let (addr, _) = spawn_gateway().await;
    let client = reqwest::Client::new();

    // Not on the rich list, and the chat surface is down.
    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({
            "user_message": "Hi",
            "model": "gpt-3.5-turbo",
            "api_key": KEY,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Error: All models failed. Last error: "));
    assert_eq!(body.matches("Error:").count(), 1);
}

#[tokio::test]
async fn invalid_reasoning_effort_is_a_bad_request() {
    let (addr, _) = spawn_gateway().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({
            "user_message": "Hi",
            "api_key": KEY,
            "reasoning_effort": "extreme",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("extreme"));
}

#[tokio::test]
async fn upload_list_and_clear_session() {
    let (addr, backend) = spawn_gateway().await;
    let client = reqwest::Client::new();

    let first = upload(&client, addr, "readme.txt").await;
    assert_eq!(first["filename"], "readme.txt");
    assert_eq!(first["size"], 500);
    assert_eq!(first["vector_store_id"], "vs_0");
    assert_eq!(
        first["message"],
        "File uploaded successfully to OpenAI and added to vector store"
    );

    let second = upload(&client, addr, "notes.txt").await;
    assert_eq!(second["vector_store_id"], "vs_0");

    let files: serde_json::Value = client
        .get(format!("http://{addr}/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files["files"].as_array().unwrap().len(), 2);

    let stores: serde_json::Value = client
        .get(format!("http://{addr}/api/vector-stores"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stores["vector_stores"]["ABCDEFGH"], "vs_0");

    let cleared: serde_json::Value = client
        .post(format!("http://{addr}/api/clear-session"))
        .form(&[("api_key", KEY)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["files_removed"], 2);
    assert_eq!(cleared["vector_store_cleared"], true);
    assert_eq!(*backend.deleted.lock().unwrap(), vec!["vs_0".to_string()]);

    let health: serde_json::Value = client
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["uploaded_files"], 0);
    assert_eq!(health["active_vector_stores"], 0);
}

#[tokio::test]
async fn upload_reports_when_file_was_not_indexed() {
    let (addr, backend) = spawn_gateway().await;
    backend.fail_attach.store(true, Ordering::SeqCst);

    let uploaded = upload(&reqwest::Client::new(), addr, "readme.txt").await;

    assert_eq!(uploaded["file_id"], "file-0");
    assert!(uploaded["vector_store_id"].is_null());
    assert_eq!(
        uploaded["message"],
        "File uploaded successfully to OpenAI but could not be added to vector store"
    );
}

#[tokio::test]
async fn delete_file_removes_metadata_once() {
    let (addr, _) = spawn_gateway().await;
    let client = reqwest::Client::new();

    let uploaded = upload(&client, addr, "readme.txt").await;
    let file_id = uploaded["file_id"].as_str().unwrap().to_string();

    let response = client
        .delete(format!("http://{addr}/api/files/{file_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .delete(format!("http://{addr}/api/files/{file_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let (addr, backend) = spawn_gateway().await;
    let form = reqwest::multipart::Form::new().text("api_key", KEY);

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/upload-file"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(backend.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn research_returns_structured_report() {
    let (addr, _) = spawn_gateway().await;

    let report: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/research"))
        .json(&serde_json::json!({ "query": "rust async", "api_key": KEY }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(report["query"], "rust async");
    assert_eq!(report["sources"][0], "OpenAI Analysis");
    assert_eq!(report["findings"].as_array().unwrap().len(), 1);
}
