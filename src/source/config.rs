//! API connection configuration and retry constants

use std::fmt;
use std::time::Duration;

/// Maximum number of retries for failed requests.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay before the first retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default token endpoint, relative to the base URL.
pub const DEFAULT_AUTH_PATH: &str = "/auth/token";

/// Calculate exponential backoff delay
pub fn calculate_backoff(initial: Duration, retry_count: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry_count);
    let delay_ms = (initial.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Login credentials for the token endpoint
#[derive(Clone)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings for [`super::ApiClient`]
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://orders.example.com/api`
    pub base_url: String,
    /// Credentials; requests are unauthenticated when absent
    pub credentials: Option<Credentials>,
    /// Token endpoint path
    pub auth_path: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries for network errors, 429 and 5xx responses
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub initial_backoff: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl ApiConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            user_agent: concat!("order-desk-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Authenticate with username and password
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Override the token endpoint path
    pub fn with_auth_path(mut self, auth_path: impl Into<String>) -> Self {
        self.auth_path = auth_path.into();
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the initial retry delay
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Full URL for a path relative to the base URL
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
