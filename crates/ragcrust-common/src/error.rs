/// Shared error type used across all ragcrust crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("agent: {0}")]
    Agent(String),

    #[error("provider: {0}")]
    Provider(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("database: {0}")]
    Database(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
