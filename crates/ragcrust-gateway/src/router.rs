use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get, post};
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api;
use crate::state::SharedState;

/// Largest accepted multipart upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = build_cors_layer(&state.config.gateway.allowed_origins);
    let rate_limit = state.config.gateway.rate_limit.clone();

    let router = Router::new()
        .route("/", get(api::index))
        .route("/api/health", get(api::health))
        .route("/api/chat", post(api::chat))
        .route(
            "/api/upload-file",
            post(api::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/files", get(api::list_files))
        .route("/api/files/{id}", delete(api::delete_file))
        .route("/api/clear-session", post(api::clear_session))
        .route("/api/vector-stores", get(api::vector_stores))
        .route("/api/research", post(api::research))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Per-IP token bucket. Needs the router served with connect info so the
    // peer address is available.
    let governor = rate_limit.as_ref().and_then(|rl| {
        let Some(conf) = GovernorConfigBuilder::default()
            .per_second(rl.per_second)
            .burst_size(rl.burst_size)
            .finish()
        else {
            warn!(
                per_second = rl.per_second,
                burst_size = rl.burst_size,
                "invalid rate limit, per-IP rate limiting disabled"
            );
            return None;
        };

        let limiter = conf.limiter().clone();
        // Clean up rate-limiter state for inactive IPs.
        tokio::spawn(async move {
            let interval = Duration::from_secs(60);
            loop {
                tokio::time::sleep(interval).await;
                limiter.retain_recent();
            }
        });

        info!(
            per_second = rl.per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );
        Some(GovernorLayer::new(conf))
    });

    match governor {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(exact))
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ragcrust_agents::{ChatRuntime, OpenAiBackendFactory};
    use ragcrust_config::AppConfig;
    use ragcrust_db::InMemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppState;

    fn state(config: AppConfig) -> SharedState {
        let store = Arc::new(InMemoryStore::new());
        let runtime = ChatRuntime::new(
            &config,
            Arc::new(OpenAiBackendFactory::new("http://127.0.0.1:9")),
            store.clone(),
            store,
        );
        Arc::new(AppState::new(config, runtime))
    }

    #[tokio::test]
    async fn index_and_health_need_no_provider() {
        let app = build_router(state(AppConfig::default()));

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["uploaded_files"], 0);
    }

    #[tokio::test]
    async fn chat_without_any_credential_is_rejected() {
        let app = build_router(state(AppConfig::default()));
        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"user_message":"Hi"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let mut config = AppConfig::default();
        config.gateway.allowed_origins = vec!["http://localhost:3000".into()];
        let app = build_router(state(config));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );
    }
}
