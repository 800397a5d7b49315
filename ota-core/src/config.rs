//! Updater configuration that can be validated independently of the device

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::DEFAULT_REDIRECT_BUDGET;

const MAX_URL_LEN: usize = 256;
/// Level names accepted for `log_level`, compared case-insensitively
pub const LOG_LEVELS: [&str; 7] = ["off", "error", "warn", "warning", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("manifest URL cannot be empty")]
    EmptyUrl,

    #[error("manifest URL must start with http:// or https://")]
    UnsupportedScheme,

    #[error("manifest URL must be 256 characters or less")]
    UrlTooLong,

    #[error("manifest URL cannot contain whitespace or control characters")]
    InvalidUrlCharacters,

    #[error("check interval must be at least one second")]
    ZeroInterval,

    #[error("redirect budget must allow at least one request")]
    ZeroRedirectBudget,

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdaterConfig {
    pub enabled: bool,
    pub manifest_url: String,
    pub check_interval_secs: u64,
    pub redirect_budget: u8,
    pub log_level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest_url: String::new(),
            check_interval_secs: 60 * 60,
            redirect_budget: DEFAULT_REDIRECT_BUDGET,
            log_level: "info".to_string(),
        }
    }
}

impl UpdaterConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_manifest_url(&self.manifest_url)?;
        if self.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.redirect_budget == 0 {
            return Err(ConfigError::ZeroRedirectBudget);
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::UnknownLogLevel(self.log_level.clone()));
        }
        Ok(())
    }
}

pub fn validate_manifest_url(url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::EmptyUrl);
    }
    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(ConfigError::UnsupportedScheme);
    }
    if url.len() > MAX_URL_LEN {
        return Err(ConfigError::UrlTooLong);
    }
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ConfigError::InvalidUrlCharacters);
    }
    Ok(())
}
