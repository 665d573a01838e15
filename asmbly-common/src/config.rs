//! Configuration loading and database path resolution
//!
//! Bootstrap settings come from a TOML file; secrets and paths can be
//! overridden from the environment or the command line. Priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: every field has a default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "ASMBLY_CONFIG";
/// Environment variable naming the SQLite database file
pub const ENV_DATABASE: &str = "ASMBLY_DATABASE";
/// Environment variable overriding the CRM base URL
pub const ENV_CRM_BASE_URL: &str = "ASMBLY_CRM_BASE_URL";
/// CRM organization id (basic auth user)
pub const ENV_NEON_USER: &str = "NEON_USER";
/// CRM API key (basic auth password)
pub const ENV_NEON_API_KEY: &str = "NEON_API_KEY";

const DEFAULT_CRM_BASE_URL: &str = "https://api.neoncrm.com";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: Option<PathBuf>,
    pub crm: CrmConfig,
    pub sync: SyncConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

/// CRM connection settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CrmConfig {
    pub base_url: String,
    /// Organization id used as the basic-auth user
    pub org_id: Option<String>,
    pub api_key: Option<String>,
    pub requests_per_second: u32,
    /// Attempts per request before a 429/502 becomes fatal
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CRM_BASE_URL.to_string(),
            org_id: None,
            api_key: None,
            requests_per_second: 10,
            max_retries: 10,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            page_size: 200,
            timeout_secs: 30,
        }
    }
}

impl CrmConfig {
    /// Organization id and API key, both required for any CRM call
    pub fn credentials(&self) -> Result<(String, String)> {
        let org_id = self
            .org_id
            .as_deref()
            .filter(|v| is_valid_key(v))
            .ok_or_else(|| {
                Error::Config(format!(
                    "CRM organization id not configured (set {} or crm.org_id)",
                    ENV_NEON_USER
                ))
            })?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|v| is_valid_key(v))
            .ok_or_else(|| {
                Error::Config(format!(
                    "CRM API key not configured (set {} or crm.api_key)",
                    ENV_NEON_API_KEY
                ))
            })?;
        Ok((org_id.to_string(), api_key.to_string()))
    }
}

/// Job tuning
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent per-member fetches
    pub concurrency: usize,
    /// Maximum entries in the per-run event metadata cache
    pub event_cache_capacity: usize,
    /// Fitted risk model coefficients (JSON)
    pub risk_model_path: Option<PathBuf>,
    /// Members enrolled for fewer days than this are not scored
    pub min_tenure_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            event_cache_capacity: 1024,
            risk_model_path: None,
            min_tenure_days: 14,
        }
    }
}

/// Dashboard HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5730".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Overlay values present in the environment
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_NEON_USER) {
            if is_valid_key(&v) {
                self.crm.org_id = Some(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_NEON_API_KEY) {
            if is_valid_key(&v) {
                self.crm.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_CRM_BASE_URL) {
            if is_valid_key(&v) {
                self.crm.base_url = v;
            }
        }
    }
}

/// Non-empty, non-whitespace value
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Locate the config file: CLI, then environment, then the platform paths.
///
/// Returns `None` when no candidate exists.
pub fn config_file_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if is_valid_key(&path) {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("asmbly").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/asmbly/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load the TOML config (or defaults) and overlay the environment.
///
/// An explicitly named file that cannot be read is an error; no file at all
/// falls back to defaults with a warning.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match config_file_path(cli_arg) {
        Some(path) => {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            info!("Loaded configuration from {}", path.display());
            TomlConfig::from_toml_str(&content)?
        }
        None => {
            warn!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env();
    Ok(config)
}

/// Resolve the database path: CLI, environment, TOML, then the default.
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_DATABASE) {
        if is_valid_key(&path) {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.database_path {
        return path.clone();
    }

    default_database_path()
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("asmbly"))
        .unwrap_or_else(|| PathBuf::from("./asmbly_data"))
        .join("asmbly.db")
}
