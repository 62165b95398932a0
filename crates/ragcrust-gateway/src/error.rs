use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ragcrust_common::Error;
use tracing::warn;

/// Handler error. Missing credentials and bad input are the caller's fault;
/// everything else is reported as a server error.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(Error::Config(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        let detail = match self.0 {
            Error::Config(msg) | Error::NotFound(msg) => msg,
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
