//! Content API configuration.
//!
//! Resolved once by the shell at startup and handed to the core with
//! `Event::AppStarted`; every store receives a copy when it is mounted.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::SyncError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3005/api";
pub const BASE_URL_ENV: &str = "LINGO_API_BASE_URL";

const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidRequest {
            reason: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawApiConfig")]
pub struct ApiConfig {
    base_url: String,
}

#[derive(Deserialize)]
struct RawApiConfig {
    base_url: String,
}

impl TryFrom<RawApiConfig> for ApiConfig {
    type Error = ConfigError;

    fn try_from(raw: RawApiConfig) -> Result<Self, Self::Error> {
        Self::new(raw.base_url)
    }
}

impl ApiConfig {
    /// Accepts absolute `http(s)` URLs that can carry a path.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = base_url.into();
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: raw.chars().take(64).collect(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(invalid("URL cannot be empty"));
        }
        if raw.len() > MAX_URL_LENGTH {
            return Err(invalid("URL is too long"));
        }
        let parsed = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err(invalid("URL must have a host and path"));
        }

        Ok(Self {
            base_url: parsed.to_string(),
        })
    }

    /// Reads `LINGO_API_BASE_URL`, falling back to the default when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(BASE_URL_ENV) {
            Ok(base) => Self::new(base),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint<I, S>(&self, segments: I) -> Result<Url, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.parse_base()?;
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Resolves a server-relative asset path such as `/uploads/apple.png`
    /// against the API origin. Absolute URLs pass through unchanged.
    pub fn asset_url(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        if let Ok(absolute) = Url::parse(path) {
            return Some(absolute.to_string());
        }
        let base = self.parse_base().ok()?;
        let origin = base.origin().ascii_serialization();
        let joined = if path.starts_with('/') {
            format!("{origin}{path}")
        } else {
            format!("{origin}/{path}")
        };
        Some(joined)
    }

    fn parse_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}
