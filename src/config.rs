use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PDCA_GRAPH_CONFIG";

/// Config file looked up in the current directory when `PDCA_GRAPH_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "pdca-graph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
    /// File the configuration was read from, `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Referential integrity stays advisory unless this is turned on
    #[serde(default)]
    pub enforce_foreign_keys: bool,
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            enforce_foreign_keys: false,
            journal_mode: default_journal_mode(),
        }
    }
}

/// Query defaults used by the command line front end
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_kind")]
    pub default_kind: String,
    #[serde(default = "default_path_max_depth")]
    pub path_max_depth: u32,
    #[serde(default = "default_breadcrumb_depth")]
    pub breadcrumb_depth: usize,
    #[serde(default = "default_top_connected")]
    pub top_connected: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_kind: default_kind(),
            path_max_depth: default_path_max_depth(),
            breadcrumb_depth: default_breadcrumb_depth(),
            top_connected: default_top_connected(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pdca_timeline.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_kind() -> String {
    crate::graph::DEFAULT_KIND.to_string()
}

fn default_path_max_depth() -> u32 {
    crate::graph::DEFAULT_PATH_DEPTH
}

fn default_breadcrumb_depth() -> usize {
    crate::graph::DEFAULT_BREADCRUMB_DEPTH
}

fn default_top_connected() -> usize {
    crate::graph::DEFAULT_TOP_CONNECTED
}

pub(crate) const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PDCA_GRAPH_CONFIG environment variable (must exist)
    /// 2. ./pdca-graph.toml in current directory (optional; defaults otherwise)
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file without validating it
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.query.default_kind.trim().is_empty() {
            anyhow::bail!("query.default_kind must not be empty");
        }

        if self.query.top_connected == 0 {
            anyhow::bail!("query.top_connected must be greater than 0");
        }

        let mode = self.store.journal_mode.to_uppercase();
        if !JOURNAL_MODES.contains(&mode.as_str()) {
            anyhow::bail!(
                "store.journal_mode must be one of {:?}, got {}",
                JOURNAL_MODES,
                self.store.journal_mode
            );
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var(CONFIG_ENV).ok();
        match config_path {
            Some(p) => std::env::set_var(CONFIG_ENV, p),
            None => std::env::remove_var(CONFIG_ENV),
        }
        f();
        std::env::remove_var(CONFIG_ENV);
        if let Some(val) = original {
            std::env::set_var(CONFIG_ENV, val);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.db_path, PathBuf::from("pdca_timeline.db"));
        assert!(!config.store.enforce_foreign_keys);
        assert_eq!(config.query.default_kind, "PRECEDES");
        assert_eq!(config.query.path_max_depth, 10);
        assert_eq!(config.query.breadcrumb_depth, 5);
        assert_eq!(config.query.top_connected, 10);
        assert!(config.source.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[store]
db_path = "/tmp/graph.db"

[query]
breadcrumb_depth = 3
"#,
        )
        .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/graph.db"));
        assert_eq!(config.store.log_level, "info");
        assert_eq!(config.store.journal_mode, "WAL");
        assert_eq!(config.query.breadcrumb_depth, 3);
        assert_eq!(config.query.path_max_depth, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.query.top_connected = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.query.default_kind = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.journal_mode = "sideways".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("journal_mode"));
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("graph.toml");
        fs::write(
            &config_path,
            r#"
[store]
log_level = "debug"
enforce_foreign_keys = true

[query]
default_kind = "REFINES"
"#,
        )
        .unwrap();
        with_config_env(Some(config_path.as_path()), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.store.log_level, "debug");
            assert!(config.store.enforce_foreign_keys);
            assert_eq!(config.query.default_kind, "REFINES");
            assert_eq!(config.source.as_deref(), Some(config_path.as_path()));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Some(Path::new("nonexistent-graph.toml")), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config
                .unwrap_err()
                .to_string()
                .contains("nonexistent-graph.toml"));
        });
    }

    #[test]
    fn test_config_malformed_toml() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[store\ndb_path = ").unwrap();
        with_config_env(Some(config_path.as_path()), || {
            assert!(Config::load().is_err());
        });
    }
}
