//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use udaan_session::ClientConfig;

use crate::endpoints;
use crate::error::CoreError;
use crate::Result;

pub const API_BASE_URL_ENV: &str = "UDAAN_API_BASE_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "UDAAN_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_BASE_URL: &str = "http://localhost:9003/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file holding credentials and flags
    pub database_path: PathBuf,
    /// API root, e.g. `https://gym.example.com/api/v1`
    pub api_base_url: String,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Token refresh endpoint, relative to the API root
    pub refresh_path: String,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("udaan.db"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_path: endpoints::auth::REFRESH.to_string(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Udaan"))
            .unwrap_or_else(|| PathBuf::from(".udaan"))
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }

        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| {
                CoreError::Config(format!("{REQUEST_TIMEOUT_ENV} must be whole seconds, got {raw:?}"))
            })?;
        }

        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Session-level settings derived from this configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }

        Ok(ClientConfig::new(&self.api_base_url)?
            .with_timeout(self.request_timeout())
            .with_refresh_path(self.refresh_path.clone()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/data"));
        assert_eq!(config.database_path, PathBuf::from("/data/udaan.db"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_path, "auth/refresh");
    }

    #[test]
    fn test_data_dir_is_app_specific() {
        let dir = Config::data_dir();
        assert!(dir.ends_with("Udaan") || dir == PathBuf::from(".udaan"));
        assert_eq!(Config::default().database_path, dir.join("udaan.db"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::new(PathBuf::from("/data"))
            .with_overrides(lookup(&[
                (API_BASE_URL_ENV, "https://gym.example.com/api/v1"),
                (REQUEST_TIMEOUT_ENV, "12"),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "https://gym.example.com/api/v1");
        assert_eq!(config.request_timeout_secs, 12);

        let client = config.client_config().unwrap();
        assert_eq!(client.base_url.as_str(), "https://gym.example.com/api/v1/");
        assert_eq!(client.timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_blank_base_url_is_ignored() {
        let config = Config::new(PathBuf::from("/data"))
            .with_overrides(lookup(&[(API_BASE_URL_ENV, "  ")]))
            .unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let result = Config::new(PathBuf::from("/data"))
            .with_overrides(lookup(&[(REQUEST_TIMEOUT_ENV, "soon")]));
        assert!(matches!(result, Err(CoreError::Config(_))));

        let mut config = Config::new(PathBuf::from("/data"));
        config.request_timeout_secs = 0;
        assert!(matches!(config.client_config(), Err(CoreError::Config(_))));
    }
}
