//! Client configuration with sensible defaults.
//!
//! [`ClientConfig`] is the immutable base every call derives from. Per-call
//! overrides live in [`ClientOptions`](crate::api::request::ClientOptions) and
//! never write back into the config.

use std::time::Duration;

use crate::auth::TOKEN_KEY;

/// Default unary request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Default base URL for relative paths.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/api";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "STREAMFETCH_BASE_URL";

/// Environment variable overriding [`ClientConfig::timeout`], in seconds.
pub const TIMEOUT_ENV: &str = "STREAMFETCH_TIMEOUT_SECS";

/// Base configuration shared by every call made through one
/// [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL relative paths are joined onto. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Whole-request timeout for unary calls, and the connect timeout for
    /// every call. Streams are never cut off once connected. Default: 100
    /// seconds.
    pub timeout: Duration,
    /// `User-Agent` header. Default: `"streamfetch/<version>"`.
    pub user_agent: String,
    /// Key the bearer token is stored under. Default: `"console_token"`.
    pub token_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("streamfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            token_key: TOKEN_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `STREAMFETCH_BASE_URL` and
    /// `STREAMFETCH_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        match lookup(TIMEOUT_ENV).map(|s| s.trim().parse::<u64>()) {
            Some(Ok(secs)) => config.timeout = Duration::from_secs(secs),
            Some(Err(e)) => tracing::warn!("ignoring invalid {TIMEOUT_ENV}: {e}"),
            None => {}
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Build the shared transport. Redirects are followed; nothing is retried.
    ///
    /// Only connecting is bounded here. The whole-request timeout is applied
    /// per unary call.
    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
    }
}
