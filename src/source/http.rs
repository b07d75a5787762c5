//! HTTP transport for the order desk API
//!
//! Provides one client for all API interactions with:
//! - Bearer token authentication, cached until the API rejects it
//! - Retry with exponential backoff on network errors, 429 and 5xx
//! - 404 mapped to `Ok(None)` so callers can tell "not there" from "broken"

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::config::{calculate_backoff, ApiConfig};
use super::parser;
use super::{SourceError, SourceResult};
use crate::metrics::{self, RequestTimer};

/// Authenticated client for the order desk API
///
/// Constructed explicitly and shared through an `Arc` by every source that needs it.
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a client with its own connection pool
    pub fn new(config: ApiConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(client: Client, config: ApiConfig) -> Self {
        Self {
            client,
            config,
            token: RwLock::new(None),
        }
    }

    /// Connection settings
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Log in and cache the returned token
    ///
    /// # Errors
    /// [`SourceError::Authentication`] if no credentials are configured or the API
    /// rejects them.
    pub async fn authenticate(&self) -> SourceResult<String> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            SourceError::Authentication("no credentials configured".to_string())
        })?;

        let url = self.config.url(&self.config.auth_path);
        debug!(url = %url, username = %credentials.username, "Requesting API token");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Authentication(format!("{status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Invalid token response: {e}")))?;
        let token = parser::parse_token(&body)?;

        *self.token.write().await = Some(token.clone());
        info!(username = %credentials.username, "Authenticated with API");
        Ok(token)
    }

    /// Forget the cached token so the next request logs in again
    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Token for the next request, logging in if needed
    async fn bearer(&self) -> SourceResult<Option<String>> {
        if self.config.credentials.is_none() {
            return Ok(None);
        }
        if let Some(token) = self.token.read().await.clone() {
            return Ok(Some(token));
        }
        self.authenticate().await.map(Some)
    }

    /// GET a path, `Ok(None)` on 404
    pub async fn fetch(&self, path: &str, params: &[(&str, String)]) -> SourceResult<Option<Value>> {
        self.request(Method::GET, path, params, None).await
    }

    /// Send a request and decode its JSON body
    ///
    /// Returns `Ok(None)` for 404 and `Ok(Some(Value::Null))` for an empty body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> SourceResult<Option<Value>> {
        let url = self.config.url(path);
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            let token = self.bearer().await?;
            let mut builder = self.client.request(method.clone(), &url).query(params);
            if let Some(token) = &token {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(method = %method, url = %url, params = params.len(), attempt = attempt + 1, "Sending API request");
            let timer = RequestTimer::start(path, attempt + 1);

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    timer.network_error();
                    warn!(
                        "Network error on attempt {}/{}: {}",
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    last_error = Some(SourceError::Network(e.to_string()));
                    if attempt < max_retries {
                        self.backoff(attempt).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            timer.finish(status.as_u16());

            if status == StatusCode::NOT_FOUND {
                debug!(url = %url, "Resource not found");
                return Ok(None);
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                self.invalidate_token().await;
                let text = response.text().await.unwrap_or_default();
                return Err(SourceError::AuthExpired(format!("{status}: {text}")));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    "Rate limit error (429) on attempt {}/{}",
                    attempt + 1,
                    max_retries + 1
                );
                last_error = Some(SourceError::RateLimitExceeded);
                if attempt < max_retries {
                    self.backoff(attempt).await;
                    continue;
                }
                break;
            }

            if status.is_server_error() {
                warn!(
                    "Server error {} on attempt {}/{}",
                    status,
                    attempt + 1,
                    max_retries + 1
                );
                last_error = Some(SourceError::Http(format!("Server error: {status}")));
                if attempt < max_retries {
                    self.backoff(attempt).await;
                    continue;
                }
                break;
            }

            if status.is_client_error() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(SourceError::Http(format!("Client error {status}: {text}")));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SourceError::Network(format!("Failed to read response body: {e}")))?;
            if bytes.is_empty() {
                return Ok(Some(Value::Null));
            }
            return serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SourceError::Parse(format!("Failed to decode response: {e}")));
        }

        Err(last_error.unwrap_or_else(|| SourceError::Network("All retries exhausted".to_string())))
    }

    async fn backoff(&self, attempt: u32) {
        let delay = calculate_backoff(self.config.initial_backoff, attempt);
        metrics::record_retry_backoff(delay, attempt + 1);
        debug!("Retrying after {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
