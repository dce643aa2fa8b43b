//! Configuration loading and value resolution
//!
//! Bootstrap settings come from a small TOML file. Every individual value is
//! resolved in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is not fatal: a warning is logged and the
//! compiled defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "RCC_CONFIG";

/// Default upstream/ledger request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Ledger ("home base") connection settings
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Social feed credentials
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Timeout for every outgoing HTTP request
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Ledger connection settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LedgerConfig {
    /// API host name, without scheme
    pub host: Option<String>,
    /// Key sent with read requests
    pub api_key: Option<String>,
    /// Bearer token sent with write requests
    pub authorization: Option<String>,
}

/// Social feed credentials
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TwitterConfig {
    /// App-only bearer token
    pub bearer_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Effective request timeout in seconds
    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Locate and load the config file, falling back to defaults
///
/// An explicit path (CLI argument or `RCC_CONFIG`) that fails to load is an
/// error; an implicit platform path that is missing just yields defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        let config = load_toml_config(&path)?;
        info!("Configuration loaded from {}", path.display());
        return Ok(config);
    }

    match find_config_file() {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Ok(TomlConfig::default())
            }
        },
        None => {
            warn!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Candidate config file locations for the current user
///
/// `~/.config/rcc/crawler.toml` first, then `/etc/rcc/crawler.toml`.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("rcc").join("crawler.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/rcc/crawler.toml"));
    }
    candidates
}

fn find_config_file() -> Option<PathBuf> {
    config_file_candidates().into_iter().find(|p| p.exists())
}

/// Resolve one string setting: CLI > ENV > TOML
///
/// Blank values are treated as absent at every tier.
pub fn resolve_value(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg.filter(|v| is_present(v)) {
        return Some(value.to_string());
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        if is_present(&value) {
            return Some(value);
        }
    }

    // Priority 3: TOML config file
    toml_value.filter(|v| is_present(v)).map(str::to_string)
}

/// Like [`resolve_value`] but a missing value is a configuration error
pub fn require_value(
    name: &str,
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Result<String> {
    resolve_value(cli_arg, env_var_name, toml_value).ok_or_else(|| {
        Error::Config(format!(
            "{} not configured. Set it via command line, ${} or the TOML config file",
            name, env_var_name
        ))
    })
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}
