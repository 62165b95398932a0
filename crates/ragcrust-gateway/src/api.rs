use axum::Json;
use axum::extract::{Form, Multipart, Path, State};
use axum::response::Response;
use ragcrust_agents::{HealthReport, KnowledgeBaseOverview, ResearchReport};
use ragcrust_common::{GenerationRequest, ReasoningEffort};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;
use crate::transport::stream_reply;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub user_message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub use_research: bool,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
}

/// POST /api/chat: stream the reply as plain text.
pub async fn chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> ApiResult<Response> {
    let effort = match body.reasoning_effort.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<ReasoningEffort>()?,
        _ => ReasoningEffort::default(),
    };
    let request = GenerationRequest::new(body.user_message, body.model.unwrap_or_default())
        .with_files(body.file_ids)
        .with_research(body.use_research)
        .with_reasoning_effort(effort);
    let request_id = request.id.clone();

    let reply = state
        .runtime
        .generate_reply(body.api_key.as_deref(), request)?;
    Ok(stream_reply(reply, request_id))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    pub file_type: &'static str,
    pub vector_store_id: Option<String>,
}

/// POST /api/upload-file: multipart with a `file` part and an `api_key` field.
pub async fn upload_file(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut api_key: Option<String> = None;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
                upload = Some((name, content_type, bytes.to_vec()));
            }
            Some("api_key") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid api_key field: {e}")))?;
                api_key = Some(value);
            }
            _ => {}
        }
    }

    let (name, content_type, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;
    let record = state
        .runtime
        .ingest_file(api_key.as_deref(), bytes, &name, content_type.as_deref())
        .await?;

    let message = if record.knowledge_base_id.is_some() {
        "File uploaded successfully to OpenAI and added to vector store"
    } else {
        "File uploaded successfully to OpenAI but could not be added to vector store"
    };
    Ok(Json(UploadResponse {
        message,
        file_id: record.file_id,
        filename: record.name,
        size: record.size,
        file_type: "document",
        vector_store_id: record.knowledge_base_id,
    }))
}

/// GET /api/files
pub async fn list_files(State(state): State<SharedState>) -> ApiResult<Json<serde_json::Value>> {
    let files: Vec<serde_json::Value> = state
        .runtime
        .list_files()?
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "id": r.file_id,
                "name": r.name,
                "size": r.size,
                "openai_id": r.file_id,
                "vector_store_id": r.knowledge_base_id,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "files": files })))
}

/// DELETE /api/files/{id}: forgets the record; the provider file is kept.
pub async fn delete_file(
    State(state): State<SharedState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.runtime.remove_file(&file_id)?;
    info!(file_id = %file_id, "file removed from session");
    Ok(Json(serde_json::json!({ "message": "File removed from session" })))
}

#[derive(Debug, Deserialize)]
pub struct CredentialForm {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// POST /api/clear-session
pub async fn clear_session(
    State(state): State<SharedState>,
    Form(form): Form<CredentialForm>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = state.runtime.clear_session(form.api_key.as_deref()).await?;
    Ok(Json(serde_json::json!({
        "message": "Session cleared successfully",
        "files_removed": report.files_removed,
        "vector_store_cleared": report.vector_store_cleared,
    })))
}

/// GET /api/vector-stores
pub async fn vector_stores(
    State(state): State<SharedState>,
) -> ApiResult<Json<KnowledgeBaseOverview>> {
    Ok(Json(state.runtime.vector_stores()?))
}

#[derive(Debug, Deserialize)]
pub struct ResearchBody {
    pub query: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// POST /api/research
pub async fn research(
    State(state): State<SharedState>,
    Json(body): Json<ResearchBody>,
) -> ApiResult<Json<ResearchReport>> {
    let report = state
        .runtime
        .research(body.api_key.as_deref(), &body.query)
        .await?;
    Ok(Json(report))
}

/// GET /api/health
pub async fn health(State(state): State<SharedState>) -> ApiResult<Json<HealthReport>> {
    Ok(Json(state.runtime.health()?))
}

pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "ragcrust API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
