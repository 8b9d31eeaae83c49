//! Configuration loader
//!
//! Loads [`FinSyncConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FINSYNC_ENVIRONMENT`: `sandbox` or `production` (required)
//! - `FINSYNC_TAX_IDENTIFIER`: VAT registration number
//! - `FINSYNC_REQUEST_TIMEOUT_SECS`, `FINSYNC_REFRESH_MARGIN_SECS`,
//!   `FINSYNC_MAX_IN_FLIGHT`, `FINSYNC_RETRY_BACKOFF_MS`: tuning overrides
//! - `FINSYNC_<PROVIDER>_CLIENT_ID`, `_CLIENT_SECRET`, `_REDIRECT_URI`,
//!   `_TENANT_ID`, `_API_BASE_URL`: per provider, where `<PROVIDER>` is one
//!   of `SARS`, `XERO`, `QUICKBOOKS`, `SAGE`, `ZOHO_BOOKS`
//!
//! A provider is configured from the environment when its `_CLIENT_ID` is
//! set; its secret and redirect URI are then required.
//!
//! ## File Locations
//! The loader probes `./finsync.toml`, `./finsync.json` and
//! `./config/finsync.toml` relative to the working directory, then the same
//! names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use finsync_domain::{Environment, FinSyncConfig, FinSyncError, ProviderId, ProviderSettings, Result};
use thiserror::Error;

use crate::errors::InfraError;

const ENV_PREFIX: &str = "FINSYNC";

const CONFIG_FILE_NAMES: [&str; 3] = ["finsync.toml", "finsync.json", "config/finsync.toml"];

/// Reasons a configuration source could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("no provider credentials found in environment variables")]
    NoProviders,

    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for FinSyncError {
    fn from(value: ConfigError) -> Self {
        FinSyncError::Config(value.to_string())
    }
}

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FinSyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<FinSyncConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!(
                environment = %config.environment,
                providers = config.providers.len(),
                "Configuration loaded from environment variables"
            );
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `FinSyncError::Config` if `FINSYNC_ENVIRONMENT` is missing, no
/// provider is configured, or any value fails to parse or validate.
pub fn load_from_env() -> Result<FinSyncConfig> {
    let mut config = FinSyncConfig {
        environment: env_parse::<Environment>("ENVIRONMENT")?,
        tax_identifier: optional_env("TAX_IDENTIFIER"),
        ..FinSyncConfig::default()
    };

    if let Some(secs) = optional_parse("REQUEST_TIMEOUT_SECS")? {
        config.request_timeout_secs = secs;
    }
    if let Some(secs) = optional_parse("REFRESH_MARGIN_SECS")? {
        config.refresh_margin_secs = secs;
    }
    if let Some(limit) = optional_parse("MAX_IN_FLIGHT")? {
        config.max_in_flight = limit;
    }
    if let Some(ms) = optional_parse("RETRY_BACKOFF_MS")? {
        config.retry_backoff_ms = ms;
    }

    for provider in ProviderId::ALL {
        if let Some(settings) = provider_from_env(provider)? {
            config.providers.insert(provider, settings);
        }
    }

    if config.providers.is_empty() {
        return Err(ConfigError::NoProviders.into());
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations (see
/// [`probe_config_paths`]). Format is chosen by extension.
///
/// # Errors
/// Returns `FinSyncError::Config` if the file is missing, unreadable,
/// malformed, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<FinSyncConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p).into());
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<FinSyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Json(e).into()),
        _ => Err(ConfigError::UnsupportedFormat(extension.to_string()).into()),
    }
}

/// First existing config file among the standard locations, if any.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn provider_from_env(provider: ProviderId) -> Result<Option<ProviderSettings>> {
    let key = |field: &str| format!("{}_{field}", provider.env_key());

    let Some(client_id) = optional_env(&key("CLIENT_ID")) else {
        return Ok(None);
    };

    let mut settings = ProviderSettings::new(
        client_id,
        env_var(&key("CLIENT_SECRET"))?,
        env_var(&key("REDIRECT_URI"))?,
    );
    settings.tenant_id = optional_env(&key("TENANT_ID"));
    settings.api_base_url = optional_env(&key("API_BASE_URL"));
    Ok(Some(settings))
}

fn var_name(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| ConfigError::MissingVar(var_name(key)).into())
}

/// Non-empty environment variable, if set
fn optional_env(key: &str) -> Option<String> {
    std::env::var(var_name(key)).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_var(key)?;
    raw.parse::<T>().map_err(|e| {
        ConfigError::InvalidValue { name: var_name(key), reason: e.to_string() }.into()
    })
}

fn optional_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(_) => env_parse(key).map(Some),
        None => Ok(None),
    }
}
