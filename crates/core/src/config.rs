//! TOML-based configuration system for bommerge.
//!
//! Configuration is deliberately small: a listen address, a data directory,
//! and a handful of behaviour toggles. There are no secrets; everything
//! lives in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server process settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Merged-snapshot behaviour settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Server process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP API (default `127.0.0.1:3000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for persistent data (the SQLite database).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_listen() -> String {
    "127.0.0.1:3000".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/bommerge")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database filename inside `server.data_dir` (default `bommerge.db`).
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_db_file() -> String {
    "bommerge.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot behaviour
// ---------------------------------------------------------------------------

/// Merged-snapshot behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Reject a snapshot save whose name is already taken (default true).
    /// Turn off only for compatibility with datasets that predate uniform
    /// enforcement and already hold duplicate names.
    #[serde(default = "default_true")]
    pub enforce_unique_names: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enforce_unique_names: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: "listen address must not be empty".into(),
            });
        }
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: format!("'{}' is not a valid socket address", self.server.listen),
            });
        }
        if self.storage.db_file.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.db_file".into(),
                detail: "database filename must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Full path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join(&self.storage.db_file)
    }

    /// A commented sample configuration, used by `bommerge init`.
    pub fn sample_toml() -> &'static str {
        r#"# bommerge configuration

[server]
# Listen address for the HTTP API.
listen = "127.0.0.1:3000"
# Minimum log level: trace, debug, info, warn, error.
log_level = "info"
# Directory holding the SQLite database.
data_dir = "/var/lib/bommerge"

[storage]
# Database filename inside data_dir.
db_file = "bommerge.db"

[snapshot]
# Reject snapshot saves whose name is already taken.
enforce_unique_names = true
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_sample_config() {
        let config: AppConfig =
            toml::from_str(AppConfig::sample_toml()).expect("failed to parse sample toml");
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.storage.db_file, "bommerge.db");
        assert!(config.snapshot.enforce_unique_names);
        config.validate().expect("sample config must validate");
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config: AppConfig = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(
            config.db_path(),
            PathBuf::from("/var/lib/bommerge/bommerge.db")
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"[server]\nlisten = \"0.0.0.0:8080\"\nlog_level = \"debug\"\n")
            .unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_bad_listen() {
        let mut config = AppConfig::default();
        config.server.listen = "not-an-address".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "server.listen"
        ));
    }
}
