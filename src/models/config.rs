//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream timetable site settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// On-disk persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background refresh settings
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Group association scraper settings
    #[serde(default)]
    pub groups: GroupsConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.base_url.trim().is_empty() {
            return Err(AppError::validation("fetcher.base_url is empty"));
        }
        url::Url::parse(&self.fetcher.base_url)?;
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.sweep.interval_secs == 0 {
            return Err(AppError::validation("sweep.interval_secs must be > 0"));
        }
        if let Some(path) = &self.sweep.users_file {
            if !path.is_file() {
                return Err(AppError::config(format!(
                    "sweep.users_file {} does not exist",
                    path.display()
                )));
            }
        }
        if self.server.bind.trim().is_empty() {
            return Err(AppError::validation("server.bind is empty"));
        }
        Ok(())
    }
}

/// Upstream timetable site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the schedule site (with trailing slash)
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// On-disk persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for timetables and the association map
    #[serde(default = "defaults::root_dir")]
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
        }
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweeps
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Pause between two groups in one sweep, in milliseconds
    #[serde(default = "defaults::group_delay")]
    pub group_delay_ms: u64,

    /// Period refreshed by the sweep and served when a lookup names none
    #[serde(default = "defaults::period")]
    pub period: u32,

    /// Statically configured group ids
    #[serde(default)]
    pub groups: Vec<u32>,

    /// JSON user directory file (`[{"group": 1234}, ...]`)
    #[serde(default)]
    pub users_file: Option<PathBuf>,
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn group_delay(&self) -> Duration {
        Duration::from_millis(self.group_delay_ms)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            group_delay_ms: defaults::group_delay(),
            period: defaults::period(),
            groups: Vec::new(),
            users_file: None,
        }
    }
}

/// Group association scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Pause between category page fetches, in milliseconds
    #[serde(default = "defaults::category_delay")]
    pub category_delay_ms: u64,
}

impl GroupsConfig {
    pub fn category_delay(&self) -> Duration {
        Duration::from_millis(self.category_delay_ms)
    }
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            category_delay_ms: defaults::category_delay(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Fetcher defaults
    pub fn base_url() -> String {
        "http://planzajec.uek.krakow.pl/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; timetable-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn root_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Sweep defaults
    pub fn interval() -> u64 {
        2 * 60 * 60
    }
    pub fn group_delay() -> u64 {
        1000
    }
    pub fn period() -> u32 {
        3
    }

    // Scraper defaults
    pub fn category_delay() -> u64 {
        500
    }

    // Server defaults
    pub fn bind() -> String {
        "0.0.0.0:3000".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.fetcher.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.sweep.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_users_file() {
        let mut config = Config::default();
        config.sweep.users_file = Some(PathBuf::from("/nonexistent/users.json"));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sweep]
            groups = [1234, 5678]
            group_delay_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.sweep.groups, vec![1234, 5678]);
        assert_eq!(config.sweep.group_delay(), Duration::ZERO);
        assert_eq!(config.sweep.period, 3);
        assert_eq!(config.fetcher.timeout_secs, 30);
        assert_eq!(config.storage.root_dir, PathBuf::from("storage"));
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }
}
