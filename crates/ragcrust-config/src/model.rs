use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub provider: ProviderConfig,
    pub generation: GenerationConfig,
    pub research: ResearchConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
}

// ── Gateway ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Origins allowed for CORS. `["*"]` allows any origin.
    #[serde(default = "d_origins")]
    pub allowed_origins: Vec<String>,
    /// Per-IP token bucket. Disabled when absent.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            allowed_origins: d_origins(),
            rate_limit: None,
        }
    }
}

impl GatewayConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

// ── Provider ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the fallback API key for requests that
    /// carry no credential of their own.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Ask the responses endpoint for an SSE stream instead of one payload.
    #[serde(default)]
    pub stream_responses: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            stream_responses: false,
        }
    }
}

impl ProviderConfig {
    /// Resolve the fallback API key from the configured environment variable.
    pub fn fallback_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

// ── Generation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "d_default_model")]
    pub default_model: String,
    /// Models eligible for the unified responses endpoint.
    #[serde(default = "d_rich_models")]
    pub rich_models: Vec<String>,
    /// Tried in order after the requested model by plain chat completion.
    #[serde(default = "d_fallback_models")]
    pub fallback_models: Vec<String>,
    #[serde(default = "d_assistant_model")]
    pub assistant_model: String,
    #[serde(default = "d_instructions")]
    pub instructions: String,
    #[serde(default = "d_assistant_instructions")]
    pub assistant_instructions: String,
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "d_run_poll_interval_ms")]
    pub run_poll_interval_ms: u64,
    #[serde(default = "d_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Budget for each tier before the last one. A tier that exceeds it
    /// counts as failed and the cascade moves on.
    #[serde(default = "d_tier_timeout_secs")]
    pub tier_timeout_secs: u64,
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: d_default_model(),
            rich_models: d_rich_models(),
            fallback_models: d_fallback_models(),
            assistant_model: d_assistant_model(),
            instructions: d_instructions(),
            assistant_instructions: d_assistant_instructions(),
            system_prompt: d_system_prompt(),
            run_poll_interval_ms: d_run_poll_interval_ms(),
            run_timeout_secs: d_run_timeout_secs(),
            tier_timeout_secs: d_tier_timeout_secs(),
            request_timeout_secs: d_request_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn run_poll_interval(&self) -> Duration {
        Duration::from_millis(self.run_poll_interval_ms.max(1))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_secs(self.tier_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Research ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "d_research_model")]
    pub model: String,
    /// Output cap for the brief appended to chat messages.
    #[serde(default = "d_research_max_tokens")]
    pub max_tokens: u32,
    /// Output cap for standalone research reports. Unbounded when absent.
    #[serde(default)]
    pub report_max_tokens: Option<u32>,
    #[serde(default = "d_research_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_summary_chars")]
    pub summary_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: d_research_model(),
            max_tokens: d_research_max_tokens(),
            report_max_tokens: None,
            timeout_secs: d_research_timeout_secs(),
            summary_chars: d_summary_chars(),
        }
    }
}

impl ResearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Storage ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database file for the SQLite backend. Defaults to
    /// `~/.ragcrust/ragcrust.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of trailing credential characters that form the session key.
    #[serde(default = "d_key_length")]
    pub key_length: usize,
    #[serde(default = "d_index_name_prefix")]
    pub index_name_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_length: d_key_length(),
            index_name_prefix: d_index_name_prefix(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    8000
}
fn d_origins() -> Vec<String> {
    vec!["*".into()]
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_default_model() -> String {
    "gpt-5".into()
}
fn d_rich_models() -> Vec<String> {
    ["gpt-5", "gpt-4o", "gpt-4o-mini", "gpt-4-turbo"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn d_fallback_models() -> Vec<String> {
    ["gpt-5", "gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn d_assistant_model() -> String {
    "gpt-4o-mini".into()
}
fn d_instructions() -> String {
    "You are a helpful assistant. When files are provided, use the file_search tool to find \
     relevant information from the uploaded documents. When research context is provided, \
     use it to enhance your answer."
        .into()
}
fn d_assistant_instructions() -> String {
    "You are a helpful assistant that answers questions based on the provided files and context."
        .into()
}
fn d_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn d_run_poll_interval_ms() -> u64 {
    500
}
fn d_run_timeout_secs() -> u64 {
    120
}
fn d_tier_timeout_secs() -> u64 {
    150
}
fn d_request_timeout_secs() -> u64 {
    300
}
fn d_research_model() -> String {
    "gpt-4o-mini".into()
}
fn d_research_max_tokens() -> u32 {
    500
}
fn d_research_timeout_secs() -> u64 {
    30
}
fn d_summary_chars() -> usize {
    500
}
fn d_key_length() -> usize {
    8
}
fn d_index_name_prefix() -> String {
    "Knowledge_Base_".into()
}
