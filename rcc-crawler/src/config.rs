//! Configuration resolution for rcc-crawler
//!
//! Every setting resolves with CLI → ENV → TOML priority. Ledger credentials
//! are mandatory; the Twitter token only for the Hitradio Ö3 feed source.

use crate::ledger::HomeBaseSettings;
use rcc_common::config::{require_value, resolve_value, TomlConfig};
use rcc_common::Result;
use std::time::Duration;
use tracing::info;

pub const API_HOST_ENV: &str = "RC_API_HOST";
pub const API_KEY_ENV: &str = "RC_API_KEY";
pub const API_AUTHORIZATION_ENV: &str = "RC_API_AUTHORIZATION";
pub const TWITTER_BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";
pub const LOG_LEVEL_ENV: &str = "RCC_LOG_LEVEL";

/// Ledger settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct LedgerOverrides {
    pub api_host: Option<String>,
    pub api_key: Option<String>,
    pub api_authorization: Option<String>,
}

/// Effective upstream and ledger request timeout
pub fn request_timeout(toml_config: &TomlConfig) -> Duration {
    Duration::from_secs(toml_config.request_timeout_secs())
}

/// Resolve ledger connection settings
///
/// Fails with a configuration error naming the missing setting, so the
/// binary exits before any upstream is contacted.
pub fn resolve_ledger_settings(
    overrides: &LedgerOverrides,
    toml_config: &TomlConfig,
) -> Result<HomeBaseSettings> {
    let ledger = &toml_config.ledger;

    let api_host = require_value(
        "Ledger API host",
        overrides.api_host.as_deref(),
        API_HOST_ENV,
        ledger.host.as_deref(),
    )?;
    let api_key = require_value(
        "Ledger API key",
        overrides.api_key.as_deref(),
        API_KEY_ENV,
        ledger.api_key.as_deref(),
    )?;
    let api_authorization = require_value(
        "Ledger API authorization",
        overrides.api_authorization.as_deref(),
        API_AUTHORIZATION_ENV,
        ledger.authorization.as_deref(),
    )?;

    info!(api_host = %api_host, "Ledger settings resolved");

    Ok(HomeBaseSettings {
        api_host,
        api_key,
        api_authorization,
        timeout: request_timeout(toml_config),
    })
}

/// Resolve the Twitter app-only bearer token
pub fn resolve_twitter_bearer_token(
    cli_arg: Option<&str>,
    toml_config: &TomlConfig,
) -> Result<String> {
    require_value(
        "Twitter bearer token",
        cli_arg,
        TWITTER_BEARER_TOKEN_ENV,
        toml_config.twitter.bearer_token.as_deref(),
    )
}

/// Resolve the log filter directive, defaulting to the TOML logging level
pub fn resolve_log_level(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    resolve_value(cli_arg, LOG_LEVEL_ENV, Some(&toml_config.logging.level))
        .unwrap_or_else(|| "info".to_string())
}
