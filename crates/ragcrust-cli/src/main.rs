use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragcrust_agents::{ChatRuntime, OpenAiBackendFactory};
use ragcrust_config::{AppConfig, ConfigLoader, StorageBackend};
use ragcrust_db::{FileRecordStore, InMemoryStore, IndexMapStore, SqliteStore};
use ragcrust_gateway::GatewayServer;
use ragcrust_security::RedactingWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragcrust", version, about = "Streaming chat backend with session knowledge bases")]
struct Cli {
    /// Path to a YAML or TOML config file.
    #[arg(short, long, global = true, env = "RAGCRUST_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `ragcrust_agents=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway (default).
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check that provider credentials are accepted.
    Check {
        /// Credentials to probe. Defaults to the configured key.
        keys: Vec<String>,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.json_logs);

    let mut config = ConfigLoader::new()
        .load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let runtime = build_runtime(&config)?;
            GatewayServer::new(config, runtime)
                .run()
                .await
                .context("gateway exited with an error")
        }
        Command::Check { keys } => {
            let mut keys = keys;
            if keys.is_empty() {
                keys.extend(config.provider.fallback_api_key());
            }
            anyhow::ensure!(
                !keys.is_empty(),
                "no credentials given and {} is not set",
                config.provider.api_key_env
            );

            let runtime = build_runtime(&config)?;
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let results = runtime.check_credentials(&refs).await;
            let mut all_ok = true;
            for (masked, healthy) in &results {
                println!("{masked}: {}", if *healthy { "ok" } else { "rejected" });
                all_ok &= *healthy;
            }
            anyhow::ensure!(all_ok, "one or more credentials were rejected");
            Ok(())
        }
        Command::Config => {
            let rendered =
                serde_yaml::to_string(&config).context("failed to render configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}

fn init_tracing(level: Option<&str>, json: bool) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingWriter::stderr());
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_runtime(config: &AppConfig) -> anyhow::Result<ChatRuntime> {
    let (index_store, records) = match (&config.storage.backend, &config.storage.path) {
        (StorageBackend::Sqlite, Some(path)) => shared(
            SqliteStore::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        (StorageBackend::Sqlite, None) => {
            anyhow::bail!("sqlite storage selected but no database path configured")
        }
        (StorageBackend::Memory, _) => shared(InMemoryStore::new()),
    };

    let factory = Arc::new(OpenAiBackendFactory::new(config.provider.base_url.clone()));
    let runtime = ChatRuntime::new(config, factory, index_store, records)
        .with_fallback_credential(config.provider.fallback_api_key());
    Ok(runtime)
}

/// One store serving both the index map and the file records.
fn shared<S>(store: S) -> (Arc<dyn IndexMapStore>, Arc<dyn FileRecordStore>)
where
    S: IndexMapStore + FileRecordStore + 'static,
{
    let store = Arc::new(store);
    (store.clone(), store)
}
