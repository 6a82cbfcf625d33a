//! Configuration management for Dishpatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Store credentials are supplied by the
//! hosting app and are not part of this file.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration for the data access layer.
///
/// This is loaded from `~/.config/dishpatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Document store settings
    pub store: StoreConfig,
    /// List and pagination settings
    pub query: QueryConfig,
    /// Audit log settings
    pub audit: AuditConfig,
    /// Tracing output settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `DISHPATCH_DATABASE_PATH`: Override the store database path
    /// - `DISHPATCH_MAX_CONNECTIONS`: Override the store pool size
    /// - `DISHPATCH_AUDIT_ENABLED`: Enable or disable audit recording (true/false)
    /// - `DISHPATCH_LOG_FILTER`: Override the tracing filter directive
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `DISHPATCH_*` environment overrides to this configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DISHPATCH_DATABASE_PATH") {
            tracing::debug!("Override store.database_path from env: {}", val);
            self.store.database_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("DISHPATCH_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                self.store.max_connections = max;
                tracing::debug!("Override store.max_connections from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("DISHPATCH_AUDIT_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.audit.enabled = enabled;
                tracing::debug!("Override audit.enabled from env: {}", enabled);
            }
        }

        if let Ok(val) = std::env::var("DISHPATCH_LOG_FILTER") {
            tracing::debug!("Override logging.filter from env: {}", val);
            self.logging.filter = val;
        }
    }

    /// Check values that would make the data access layer misbehave.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.max_connections == 0 {
            return Err(invalid("store.max_connections", "must be greater than zero"));
        }
        if self.store.change_buffer == 0 {
            return Err(invalid("store.change_buffer", "must be greater than zero"));
        }
        if self.query.max_page_size == 0 {
            return Err(invalid("query.max_page_size", "must be greater than zero"));
        }
        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return Err(invalid(
                "query.default_page_size",
                "must be between 1 and query.max_page_size",
            ));
        }
        if self.query.analytics_window == 0 {
            return Err(invalid("query.analytics_window", "must be greater than zero"));
        }
        if self.audit.max_read_rows == 0 {
            return Err(invalid("audit.max_read_rows", "must be greater than zero"));
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/dishpatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/dishpatch`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the database location, defaulting to `<data_dir>/dishpatch.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.store.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("dishpatch.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "dishpatch", "dishpatch").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `:memory:` for an in-memory store, unset for the data dir
    pub database_path: Option<PathBuf>,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Buffered change notifications per live subscription
    pub change_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: 5,
            change_buffer: 256,
        }
    }
}

impl StoreConfig {
    /// Settings for a throwaway in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database_path: Some(PathBuf::from(":memory:")),
            ..Self::default()
        }
    }
}

/// List and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when the caller does not ask for one
    pub default_page_size: u32,
    /// Upper bound on any page size
    pub max_page_size: u32,
    /// Number of recent orders folded by revenue analytics
    pub analytics_window: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            analytics_window: 500,
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record administrative actions
    pub enabled: bool,
    /// Upper bound on rows returned by one audit read
    pub max_read_rows: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_read_rows: 200,
        }
    }
}

/// Tracing output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Include the event target in formatted output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,dishpatch=debug".to_string(),
            with_target: true,
        }
    }
}
