//! Client configuration.
//!
//! Endpoints and credentials come from the environment with defaults for
//! local development. Override via explicit construction in tests.

use url::Url;

/// Connection settings for the issuer API and the token endpoint.
///
/// `Debug` redacts both tokens.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the credential-management API.
    pub issuer_url: Url,
    /// Endpoint exchanging a refresh token for a new access token.
    pub refresh_url: Url,
    /// Current bearer token.
    pub access_token: String,
    /// Token presented to `refresh_url`.
    pub refresh_token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("issuer_url", &self.issuer_url)
            .field("refresh_url", &self.refresh_url)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZKID_ISSUER_URL` (default: `http://127.0.0.1:3001`)
    /// - `ZKID_REFRESH_URL` (default: `<issuer>/v1/auth/refresh`)
    /// - `ZKID_ACCESS_TOKEN` (required)
    /// - `ZKID_REFRESH_TOKEN` (required)
    /// - `ZKID_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = required("ZKID_ACCESS_TOKEN")?;
        let refresh_token = required("ZKID_REFRESH_TOKEN")?;
        let issuer_url = env_url("ZKID_ISSUER_URL", "http://127.0.0.1:3001")?;
        let refresh_url = match std::env::var("ZKID_REFRESH_URL") {
            Ok(raw) => parse_url("ZKID_REFRESH_URL", &raw)?,
            Err(_) => default_refresh_url(&issuer_url)?,
        };
        Ok(Self {
            issuer_url,
            refresh_url,
            access_token,
            refresh_token,
            timeout_secs: std::env::var("ZKID_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Configuration against a single local server, e.g. a mock.
    pub fn local(base: &str, access_token: &str, refresh_token: &str) -> Result<Self, ConfigError> {
        let issuer_url = parse_url("base", base)?;
        Ok(Self {
            refresh_url: default_refresh_url(&issuer_url)?,
            issuer_url,
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            timeout_secs: 5,
        })
    }
}

fn required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, &raw)
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn default_refresh_url(issuer_url: &Url) -> Result<Url, ConfigError> {
    issuer_url
        .join("v1/auth/refresh")
        .map_err(|e| ConfigError::InvalidUrl("ZKID_REFRESH_URL".to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("{0} environment variable is required")]
    Missing(String),
    /// A URL failed to parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
