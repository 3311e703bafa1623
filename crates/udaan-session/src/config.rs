//! Session client configuration

use std::time::Duration;
use url::Url;

use crate::error::ApiError;
use crate::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root; always ends with `/` so relative paths join beneath it
    pub base_url: Url,
    /// Budget for a single request, refresh call included
    pub timeout: Duration,
    /// Refresh endpoint, relative to `base_url`
    pub refresh_path: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Resolve a path such as `members/profile` against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("{path}: {e}")))
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    Url::parse(&with_slash).map_err(|e| ApiError::InvalidRequest(format!("{raw}: {e}")))
}
