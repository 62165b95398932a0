use std::sync::Arc;

use ragcrust_agents::ChatRuntime;
use ragcrust_config::AppConfig;

/// Shared gateway state, held behind an `Arc` by every handler.
pub struct AppState {
    pub config: AppConfig,
    pub runtime: Arc<ChatRuntime>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig, runtime: ChatRuntime) -> Self {
        Self {
            config,
            runtime: Arc::new(runtime),
        }
    }
}
