//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file name, relative to `data_dir` unless absolute
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("bookmarks").to_string_lossy().to_string())
        .unwrap_or_else(|| "./bookmarks_data".to_string())
}

fn default_db_file() -> String {
    "bookmarks.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
        }
    }
}

impl StorageConfig {
    /// Full path of the SQLite database
    pub fn db_path(&self) -> PathBuf {
        let file = Path::new(&self.db_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(file)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("bookmarks").join("config.toml")),
            Some(PathBuf::from("/etc/bookmarks/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `BOOKMARKS_*` overrides from a variable lookup
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("BOOKMARKS_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(db_file) = var("BOOKMARKS_DB_FILE") {
            self.storage.db_file = db_file;
        }

        if let Some(level) = var("BOOKMARKS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("BOOKMARKS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Bookmarks Configuration
#
# Environment variables override these settings:
# - BOOKMARKS_DATA_DIR
# - BOOKMARKS_DB_FILE
# - BOOKMARKS_LOG_LEVEL
# - BOOKMARKS_LOG_FORMAT

[storage]
# Directory holding the database
data_dir = "~/.local/share/bookmarks"

# SQLite database file, relative to data_dir unless absolute
db_file = "bookmarks.db"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.db_file, "bookmarks.db");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(Path::new("generated"), &generate_default_config()).unwrap();
        assert_eq!(config.storage.data_dir, "~/.local/share/bookmarks");
        assert_eq!(config.storage.db_file, "bookmarks.db");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nformat = \"json\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.db_file, "bookmarks.db");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[storage\n").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BOOKMARKS_DATA_DIR", "/tmp/marks"),
            ("BOOKMARKS_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.storage.data_dir, "/tmp/marks");
        assert_eq!(config.storage.db_file, "bookmarks.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_db_path() {
        let mut storage = StorageConfig {
            data_dir: "/var/lib/bookmarks".to_string(),
            db_file: "marks.db".to_string(),
        };
        assert_eq!(storage.db_path(), PathBuf::from("/var/lib/bookmarks/marks.db"));

        storage.db_file = "/elsewhere/marks.db".to_string();
        assert_eq!(storage.db_path(), PathBuf::from("/elsewhere/marks.db"));
    }
}
