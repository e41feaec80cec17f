use crate::api::constants::DEFAULT_BASE_URL;
use crate::api::resilience::{BackoffConfig, PermitPolicy, UpdateConfig};
use crate::api::update::UpdateMode;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ACCESS_TOKEN_VAR: &str = "COPPER_ACCESS_TOKEN";
pub const USER_EMAIL_VAR: &str = "COPPER_USER_EMAIL";
pub const BASE_URL_VAR: &str = "COPPER_BASE_URL";

/// API key credentials, supplied out of band through the environment
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub user_email: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("user_email", &self.user_email)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {:?}", path);
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let access_token = lookup(ACCESS_TOKEN_VAR)
            .filter(|v| !v.is_empty())
            .with_context(|| format!("{} is not set", ACCESS_TOKEN_VAR))?;
        let user_email = lookup(USER_EMAIL_VAR)
            .filter(|v| !v.is_empty())
            .with_context(|| format!("{} is not set", USER_EMAIL_VAR))?;

        Ok(Self {
            access_token,
            user_email,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub update: UpdateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// `[update]` table of the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdateSettings {
    pub mode: UpdateMode,
    pub batch_size: usize,
    pub max_retries: u32,
    pub concurrency_limit: usize,
    pub permit_policy: PermitPolicy,
    pub jitter_ms: u64,
    pub default_retry_after_secs: u64,
    pub notice_window_ms: u64,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        let defaults = UpdateConfig::default();
        Self {
            mode: UpdateMode::default(),
            batch_size: defaults.batch_size,
            max_retries: defaults.max_retries,
            concurrency_limit: defaults.concurrency_limit,
            permit_policy: defaults.backoff.permit_policy,
            jitter_ms: defaults.backoff.jitter.as_millis() as u64,
            default_retry_after_secs: defaults.backoff.default_retry_after.as_secs(),
            notice_window_ms: defaults.backoff.notice_window.as_millis() as u64,
        }
    }
}

impl UpdateSettings {
    pub fn to_update_config(&self) -> UpdateConfig {
        UpdateConfig::builder()
            .batch_size(self.batch_size)
            .max_retries(self.max_retries)
            .concurrency_limit(self.concurrency_limit)
            .backoff_config(BackoffConfig {
                default_retry_after: Duration::from_secs(self.default_retry_after_secs),
                jitter: Duration::from_millis(self.jitter_ms),
                permit_policy: self.permit_policy,
                notice_window: Duration::from_millis(self.notice_window_ms),
            })
            .build()
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("copper-cli")
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".copper-cli")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    /// Base URL from `COPPER_BASE_URL`, falling back to the config file
    pub fn base_url(&self) -> String {
        std::env::var(BASE_URL_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.api.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.update.mode, UpdateMode::Sequential);
        assert_eq!(config.update.to_update_config(), UpdateConfig::default());
    }

    #[test]
    fn test_partial_update_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[update]\nmode = \"concurrent\"\nbatch_size = 25\npermit_policy = \"release-during-backoff\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.update.mode, UpdateMode::Concurrent);

        let update = config.update.to_update_config();
        assert_eq!(update.batch_size, 25);
        assert_eq!(update.max_retries, 3);
        assert_eq!(update.backoff.permit_policy, PermitPolicy::ReleaseDuringBackoff);
        assert_eq!(update.backoff.jitter, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[update\nbatch_size = ").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_credentials_from_vars() {
        let credentials = Credentials::from_vars(|key| match key {
            ACCESS_TOKEN_VAR => Some("secret".to_string()),
            USER_EMAIL_VAR => Some("me@example.com".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(credentials.user_email, "me@example.com");
        assert!(!format!("{:?}", credentials).contains("secret"));

        let missing = Credentials::from_vars(|_| None).unwrap_err();
        assert!(missing.to_string().contains(ACCESS_TOKEN_VAR));
    }
}
