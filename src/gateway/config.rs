//! Immutable gateway configuration, built once at startup.

use anyhow::{Result, anyhow, bail};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr, time::Duration};
use url::Url;

pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_GENERAL_MAX: u32 = 100;
pub const DEFAULT_RATE_LIMIT_AUTH_MAX: u32 = 5;
pub const DEFAULT_BACKEND_AUTH_PATH: &str = "/api/auth";
pub const DEFAULT_BACKEND_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(anyhow!("unknown environment: {other}")),
        }
    }
}

/// Request ceiling for one route class within a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RatePolicy {
    #[must_use]
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    backend_url: Url,
    backend_auth_path: String,
    backend_timeout: Duration,
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    environment: Environment,
    general_policy: RatePolicy,
    auth_policy: RatePolicy,
    trust_forwarded_for: bool,
    max_body_bytes: usize,
    frontend_origin: Option<String>,
}

impl GatewayConfig {
    /// Build a configuration with defaults for everything but the required values.
    ///
    /// # Errors
    /// Returns an error if the backend URL is not an absolute http(s) URL.
    pub fn new(
        backend_url: &str,
        access_secret: SecretString,
        refresh_secret: SecretString,
    ) -> Result<Self> {
        let backend_url = Url::parse(backend_url)
            .map_err(|err| anyhow!("Invalid backend URL {backend_url}: {err}"))?;
        if !matches!(backend_url.scheme(), "http" | "https") || backend_url.host_str().is_none() {
            bail!("Backend URL must be an absolute http(s) URL: {backend_url}");
        }

        let window = Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS);
        Ok(Self {
            backend_url,
            backend_auth_path: DEFAULT_BACKEND_AUTH_PATH.to_string(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECONDS),
            access_secret,
            refresh_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            environment: Environment::Development,
            general_policy: RatePolicy::new(DEFAULT_RATE_LIMIT_GENERAL_MAX, window),
            auth_policy: RatePolicy::new(DEFAULT_RATE_LIMIT_AUTH_MAX, window),
            trust_forwarded_for: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            frontend_origin: None,
        })
    }

    #[must_use]
    pub fn with_backend_auth_path(mut self, path: String) -> Self {
        let trimmed = path.trim().trim_end_matches('/');
        self.backend_auth_path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_general_policy(mut self, policy: RatePolicy) -> Self {
        self.general_policy = policy;
        self
    }

    #[must_use]
    pub fn with_auth_policy(mut self, policy: RatePolicy) -> Self {
        self.auth_policy = policy;
        self
    }

    #[must_use]
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_frontend_origin(mut self, origin: Option<String>) -> Self {
        self.frontend_origin = origin;
        self
    }

    /// Refuse to run with weak or shared secrets and nonsensical lifetimes.
    ///
    /// # Errors
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let access = self.access_secret.expose_secret();
        let refresh = self.refresh_secret.expose_secret();

        if access.len() < MIN_SECRET_BYTES {
            bail!("Access token secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if refresh.len() < MIN_SECRET_BYTES {
            bail!("Refresh token secret must be at least {MIN_SECRET_BYTES} bytes");
        }
        if access == refresh {
            bail!("Access and refresh token secrets must differ");
        }
        if self.access_token_ttl_seconds <= 0 || self.refresh_token_ttl_seconds <= 0 {
            bail!("Token TTLs must be positive");
        }
        if self.access_token_ttl_seconds >= self.refresh_token_ttl_seconds {
            bail!("Access token TTL must be shorter than refresh token TTL");
        }
        if self.general_policy.window.is_zero() || self.auth_policy.window.is_zero() {
            bail!("Rate limit window must be positive");
        }
        Ok(())
    }

    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Absolute URL of a backend auth endpoint such as `login` or `logout`.
    #[must_use]
    pub fn backend_auth_url(&self, endpoint: &str) -> String {
        let base = self.backend_url.as_str().trim_end_matches('/');
        format!("{base}{}/{endpoint}", self.backend_auth_path)
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        self.backend_timeout
    }

    pub(crate) fn access_secret(&self) -> &SecretString {
        &self.access_secret
    }

    pub(crate) fn refresh_secret(&self) -> &SecretString {
        &self.refresh_secret
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }

    #[must_use]
    pub fn general_policy(&self) -> RatePolicy {
        self.general_policy
    }

    #[must_use]
    pub fn auth_policy(&self) -> RatePolicy {
        self.auth_policy
    }

    #[must_use]
    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    #[must_use]
    pub fn frontend_origin(&self) -> Option<&str> {
        self.frontend_origin.as_deref()
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("backend_url", &self.backend_url.as_str())
            .field("backend_auth_path", &self.backend_auth_path)
            .field("backend_timeout", &self.backend_timeout)
            .field("access_secret", &"***")
            .field("refresh_secret", &"***")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("environment", &self.environment)
            .field("general_policy", &self.general_policy)
            .field("auth_policy", &self.auth_policy)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("frontend_origin", &self.frontend_origin)
            .finish()
    }
}
