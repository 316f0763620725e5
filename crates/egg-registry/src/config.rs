//! Registry configuration: base URL and download timeout.

use std::time::Duration;

use crate::error::{RegistryError, RegistryResult};

pub const ENV_REGISTRY_URL: &str = "EGG_REGISTRY_URL";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "EGG_DOWNLOAD_TIMEOUT";

/// Default total fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const REGISTRY_FILE: &str = "registry";

/// Where to fetch image blobs from, and how long to wait.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL; `None` leaves image references unresolved.
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl RegistryConfig {
    /// No registry: image references stay unresolved.
    pub fn offline() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Explicit base URL with the default timeout.
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            base_url: Some(normalize_base(&url.into())),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Base URL from `EGG_REGISTRY_URL`, else the single-line
    /// `~/.egg/registry` file; timeout from `EGG_DOWNLOAD_TIMEOUT`.
    pub fn from_env() -> RegistryResult<Self> {
        let base_url = match std::env::var(ENV_REGISTRY_URL) {
            Ok(url) if !url.trim().is_empty() => Some(normalize_base(&url)),
            _ => registry_file_url()?,
        };
        let timeout = match std::env::var(ENV_DOWNLOAD_TIMEOUT) {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => DEFAULT_TIMEOUT,
        };
        Ok(Self { base_url, timeout })
    }
}

fn normalize_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn registry_file_url() -> RegistryResult<Option<String>> {
    let Some(home) = dirs::home_dir() else {
        return Ok(None);
    };
    let path = home.join(".egg").join(REGISTRY_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| RegistryError::Config {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let line = text.lines().next().unwrap_or("").trim();
    Ok((!line.is_empty()).then(|| normalize_base(line)))
}

fn parse_timeout(raw: &str) -> RegistryResult<Duration> {
    let secs: f64 = raw.trim().parse().map_err(|_| RegistryError::Config {
        message: format!("{ENV_DOWNLOAD_TIMEOUT} must be a number of seconds, got {raw:?}"),
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(RegistryError::Config {
            message: format!("{ENV_DOWNLOAD_TIMEOUT} must be positive, got {raw:?}"),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = RegistryConfig::with_base_url("http://localhost:9000/");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn timeout_parsing() {
        assert_eq!(parse_timeout("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_timeout("0.5").unwrap(), Duration::from_millis(500));

        assert!(parse_timeout("abc").is_err());
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("-5").is_err());
        assert!(parse_timeout("inf").is_err());
    }
}
