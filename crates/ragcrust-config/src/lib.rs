pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, apply_overrides};
pub use model::{
    AppConfig, GatewayConfig, GenerationConfig, ProviderConfig, RateLimitConfig, ResearchConfig,
    SessionConfig, StorageBackend, StorageConfig,
};
