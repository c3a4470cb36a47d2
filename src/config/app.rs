//! Application configuration loading from config.toml
//!
//! Static settings for the billing worker: window length, cron schedules and the
//! fallback auto-pause threshold. Runtime-tunable values live in the `settings` table
//! (see `core::settings`); the threshold here is only the default used when no
//! setting row exists.

use crate::entities::AdPlatform;
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Postpay billing cycle settings
    pub billing: BillingConfig,
    /// Auto-pause controller settings
    pub auto_pause: AutoPauseConfig,
    /// Commission run settings
    pub commission: CommissionConfig,
}

/// `[billing]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Days a postpay window must span before it is billed
    pub window_days: i64,
    /// Cron expression (with seconds) for the billing run
    pub schedule: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            schedule: "0 0 2 * * *".to_string(),
        }
    }
}

/// `[auto_pause]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoPauseConfig {
    /// Threshold used when the `settings` table has none
    pub default_threshold: Decimal,
    /// Cron expression (with seconds) for the auto-pause check
    pub schedule: String,
    /// Platforms to check on each run
    pub platforms: Vec<AdPlatform>,
}

impl Default for AutoPauseConfig {
    fn default() -> Self {
        Self {
            default_threshold: Decimal::from(50),
            schedule: "0 */30 * * * *".to_string(),
            platforms: vec![AdPlatform::Meta, AdPlatform::Google],
        }
    }
}

/// `[commission]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    /// Cron expression (with seconds) for the monthly commission run
    pub schedule: String,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            schedule: "0 0 3 1 * *".to_string(),
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents)
}

/// Parses configuration from TOML text and validates it.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents)
        .map_err(|e| Error::Config(format!("Failed to parse config.toml: {e}")))?;

    if config.billing.window_days <= 0 {
        return Err(Error::Config(format!(
            "billing.window_days must be positive, got {}",
            config.billing.window_days
        )));
    }
    if config.auto_pause.default_threshold.is_sign_negative() {
        return Err(Error::Config(
            "auto_pause.default_threshold must not be negative".to_string(),
        ));
    }

    Ok(config)
}

/// Loads configuration from `CONFIG_PATH` (default `./config.toml`), falling back to
/// built-in defaults when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        tracing::warn!(path = %path, "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
