//! Carrier connection configuration.
//!
//! Read once at startup (see [`CarrierConfig::from_env`]) and then shared
//! immutably with the client and the tool dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.cargoboard.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

pub const ENV_API_KEY: &str = "CARGOBOARD_API_KEY";
pub const ENV_BASE_URL: &str = "CARGOBOARD_BASE_URL";
pub const ENV_TIMEOUT: &str = "CARGOBOARD_TIMEOUT";
pub const ENV_AUTH_SCHEME: &str = "CARGOBOARD_AUTH_SCHEME";
pub const ENV_PROXY: &str = "CARGOBOARD_PROXY";

/// Errors raised while assembling the configuration or the HTTP client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is required")]
    Missing(&'static str),

    #[error("invalid value `{value}` for `{key}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// How the API key is presented to the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `X-API-KEY: <key>`
    #[default]
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
}

impl FromStr for AuthScheme {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api-key" | "apikey" | "x-api-key" => Ok(Self::ApiKeyHeader),
            "bearer" => Ok(Self::Bearer),
            other => Err(ConfigError::Invalid {
                key: ENV_AUTH_SCHEME,
                value: other.to_string(),
                reason: "expected api-key|bearer".to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::ApiKeyHeader => f.write_str("api-key"),
            AuthScheme::Bearer => f.write_str("bearer"),
        }
    }
}

/// Static settings for talking to the carrier API.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
    retry_delay: Duration,
    auth_scheme: AuthScheme,
    proxy: Option<String>,
    headers: HashMap<String, String>,
}

impl CarrierConfig {
    /// Production defaults for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            auth_scheme: AuthScheme::default(),
            proxy: None,
            headers: HashMap::new(),
        }
    }

    /// Read the `CARGOBOARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let mut config = Self::new(api_key.trim());

        if let Some(base_url) = get(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = get(ENV_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: ENV_TIMEOUT,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds".to_string(),
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = get(ENV_AUTH_SCHEME) {
            config = config.with_auth_scheme(raw.parse()?);
        }
        if let Some(proxy) = get(ENV_PROXY) {
            config = config.with_proxy(proxy);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the values that can only be rejected at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.url()?;
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: ENV_TIMEOUT,
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Set the base URL. A trailing slash is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause before the single retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// Route requests through an HTTP proxy.
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Parsed base URL.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: ENV_BASE_URL,
            value: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("expected an http or https URL".to_string()));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth_scheme
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header name and value carrying the credential.
    pub(crate) fn credential_header(&self) -> (&'static str, String) {
        let key = self.api_key.expose_secret();
        match self.auth_scheme {
            AuthScheme::ApiKeyHeader => ("x-api-key", key.to_string()),
            AuthScheme::Bearer => ("authorization", format!("Bearer {key}")),
        }
    }
}
