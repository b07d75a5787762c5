//! Resource sources and API transport
//!
//! A [`ResourceSource`] answers two questions for a listener: "what comes after
//! key K" and "what is the newest key right now". The HTTP-backed sources in this
//! module share one explicitly constructed [`ApiClient`].

use crate::key::{KeyKind, Keyed, ResourceKey, ResourceType};
use async_trait::async_trait;

pub mod config;
pub mod crud;
pub mod http;
pub mod orders;
pub mod parser;
pub mod quotes;
pub mod resources;

pub use config::{ApiConfig, Credentials};
pub use http::ApiClient;
pub use orders::OrderSource;
pub use quotes::QuoteSource;
pub use resources::ApiResource;

/// Source errors
///
/// "Not found" is not an error: sources return `Ok(None)` when caught up.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Non-retryable HTTP status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network error after retries
    #[error("network error: {0}")]
    Network(String),

    /// Token rejected; the next request re-authenticates
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Login failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Response body could not be mapped
    #[error("parse error: {0}")]
    Parse(String),

    /// Rate limit exceeded after retries
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Key of the wrong kind for this source
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Remote collection a listener polls
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Resource type produced by this source
    type Resource: Keyed + Send + Sync;

    /// Name the checkpoints of this source are stored under
    fn resource_type(&self) -> ResourceType;

    /// Shape of this source's keys
    fn key_kind(&self) -> KeyKind;

    /// The resource immediately after `key`, or `None` when there is none yet
    ///
    /// Transport failures are returned as errors and never as `None`.
    async fn fetch_after(&self, key: &ResourceKey) -> SourceResult<Option<Self::Resource>>;

    /// Key of the most recently created resource, `None` for an empty collection
    async fn most_recent_key(&self) -> SourceResult<Option<ResourceKey>>;
}
