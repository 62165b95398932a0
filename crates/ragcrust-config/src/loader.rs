use std::path::{Path, PathBuf};

use ragcrust_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::model::{AppConfig, StorageBackend};

const CONFIG_DIR: &str = ".ragcrust";
const CONFIG_FILE: &str = "config.yml";

/// Loads [`AppConfig`] from a YAML or TOML file and applies environment
/// overrides on top.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR));
        Self { config_dir }
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load the explicit `path`, or the default config file when it exists,
    /// or built-in defaults. Environment overrides are applied last.
    pub fn load(&self, path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(p) => Self::read_file(p)?,
            None => {
                let default_path = self.default_config_path();
                if default_path.is_file() {
                    Self::read_file(&default_path)?
                } else {
                    debug!(
                        "no config file at {}, using defaults",
                        default_path.display()
                    );
                    AppConfig::default()
                }
            }
        };

        apply_overrides(&mut config, |key| std::env::var(key).ok());

        if config.storage.backend == StorageBackend::Sqlite && config.storage.path.is_none() {
            config.storage.path = Some(self.config_dir.join("ragcrust.db"));
        }

        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("invalid TOML in {}: {e}", path.display())))
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("invalid YAML in {}: {e}", path.display())))
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `RAGCRUST_*` overrides using `lookup` to read variables.
pub fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(host) = read("RAGCRUST_HOST") {
        config.gateway.host = host;
    }
    if let Some(port) = read("RAGCRUST_PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.gateway.port = port,
            Err(_) => warn!("ignoring invalid RAGCRUST_PORT value '{}'", port),
        }
    }
    if let Some(base_url) = read("RAGCRUST_BASE_URL") {
        config.provider.base_url = base_url;
    }
    if let Some(model) = read("RAGCRUST_DEFAULT_MODEL") {
        config.generation.default_model = model;
    }
    if let Some(path) = read("RAGCRUST_DB_PATH") {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = Some(PathBuf::from(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_config_dir(dir.path());
        let config = loader.load(None).unwrap();
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "generation:\n  default_model: gpt-4o\n").unwrap();

        let config = ConfigLoader::with_config_dir(dir.path())
            .load(Some(&path))
            .unwrap();
        assert_eq!(config.generation.default_model, "gpt-4o");
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragcrust.toml");
        std::fs::write(&path, "[research]\nmax_tokens = 200\n").unwrap();

        let config = ConfigLoader::with_config_dir(dir.path())
            .load(Some(&path))
            .unwrap();
        assert_eq!(config.research.max_tokens, 200);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "gateway: [not, a, map]").unwrap();

        let err = ConfigLoader::with_config_dir(dir.path())
            .load(Some(&path))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn sqlite_backend_gets_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "storage:\n  backend: sqlite\n").unwrap();

        let config = ConfigLoader::with_config_dir(dir.path())
            .load(Some(&path))
            .unwrap();
        assert_eq!(config.storage.path, Some(dir.path().join("ragcrust.db")));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RAGCRUST_PORT", "9001"),
            ("RAGCRUST_DEFAULT_MODEL", "gpt-4o-mini"),
            ("RAGCRUST_DB_PATH", "/tmp/rc.db"),
            ("RAGCRUST_HOST", "   "),
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.gateway.port, 9001);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.generation.default_model, "gpt-4o-mini");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/rc.db")));
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, |k| {
            (k == "RAGCRUST_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.gateway.port, 8000);
    }
}
