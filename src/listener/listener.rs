//! Listener: fetch, handle, record

use super::handler::Handler;
use super::ListenerError;
use crate::checkpoint::SharedStore;
use crate::key::{Keyed, ResourceKey, ResourceType};
use crate::metrics;
use crate::source::ResourceSource;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// Polls one resource source and advances its checkpoint
///
/// The starting point used when the store has no checkpoint is resolved on first
/// use and kept in memory for the lifetime of the listener.
pub struct Listener<S, H> {
    resource_type: ResourceType,
    source: S,
    store: SharedStore,
    handler: H,
    default_key: Option<ResourceKey>,
    resolved_default: Option<ResourceKey>,
}

impl<S, H> Listener<S, H>
where
    S: ResourceSource,
    H: Handler<S::Resource>,
{
    /// Create a listener checkpointed under the source's resource type
    pub fn new(source: S, store: SharedStore, handler: H) -> Self {
        Self {
            resource_type: source.resource_type(),
            source,
            store,
            handler,
            default_key: None,
            resolved_default: None,
        }
    }

    /// Start after `key` when no checkpoint exists, instead of after the newest resource
    pub fn with_default_key(mut self, key: ResourceKey) -> Self {
        self.default_key = Some(key);
        self
    }

    /// Store checkpoints under a different resource type name
    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    /// Resource type this listener checkpoints under
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Key to start after when the store has no checkpoint
    ///
    /// The supplied default if there is one, otherwise the newest key in the source,
    /// otherwise the zero key. Computed once; the source is not asked again.
    pub async fn resolved_default(&mut self) -> Result<ResourceKey, ListenerError> {
        if let Some(key) = self.resolved_default {
            return Ok(key);
        }

        let key = match self.default_key {
            Some(key) => key,
            None => match self.source.most_recent_key().await? {
                Some(key) => key,
                None => self.source.key_kind().zero(),
            },
        };

        info!(
            resource_type = %self.resource_type,
            key = %key,
            "Resolved starting point"
        );
        self.resolved_default = Some(key);
        Ok(key)
    }

    /// Forget the resolved default so it is computed again on next use
    pub fn reset_default(&mut self) {
        self.resolved_default = None;
    }

    /// Current checkpoint, falling back to the resolved default
    pub async fn checkpoint(&mut self) -> Result<ResourceKey, ListenerError> {
        let stored = self.store.lock().await.last_processed(&self.resource_type);
        match stored {
            Some(key) => Ok(key),
            None => self.resolved_default().await,
        }
    }

    /// Process at most one new resource
    ///
    /// Returns `Ok(true)` if a resource was handled and recorded, `Ok(false)` when
    /// caught up. Handler errors and panics are recorded as failures, not returned.
    pub async fn poll_once(&mut self) -> Result<bool, ListenerError> {
        let checkpoint = self.checkpoint().await?;

        let candidate = match self.source.fetch_after(&checkpoint).await? {
            Some(candidate) => candidate,
            None => {
                debug!(
                    resource_type = %self.resource_type,
                    checkpoint = %checkpoint,
                    "Caught up"
                );
                return Ok(false);
            }
        };

        let key = candidate.unique_identifier();
        if key == checkpoint {
            warn!(
                resource_type = %self.resource_type,
                key = %key,
                "Source returned the checkpoint itself, treating as caught up"
            );
            return Ok(false);
        }

        let outcome = AssertUnwindSafe(self.handler.handle(&candidate))
            .catch_unwind()
            .await;
        let success = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(
                    resource_type = %self.resource_type,
                    key = %key,
                    error = format!("{e:#}"),
                    "Handler failed, resource will not be retried"
                );
                false
            }
            Err(_) => {
                warn!(
                    resource_type = %self.resource_type,
                    key = %key,
                    "Handler panicked, resource will not be retried"
                );
                false
            }
        };

        self.store
            .lock()
            .await
            .record(&self.resource_type, key, success)?;
        metrics::record_resource_processed(self.resource_type.as_str(), success);

        info!(
            resource_type = %self.resource_type,
            key = %key,
            success,
            "Processed resource"
        );
        Ok(true)
    }

    /// Poll until caught up, returning how many resources were processed
    pub async fn listen(&mut self) -> Result<u64, ListenerError> {
        let mut processed = 0;
        while self.poll_once().await? {
            processed += 1;
        }
        Ok(processed)
    }
}

/// Object-safe view of a listener for the driver
#[async_trait]
pub trait Listen: Send {
    /// Resource type being listened for
    fn resource_type(&self) -> &ResourceType;

    /// Drain until caught up
    async fn listen(&mut self) -> Result<u64, ListenerError>;
}

#[async_trait]
impl<S, H> Listen for Listener<S, H>
where
    S: ResourceSource,
    H: Handler<S::Resource>,
{
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    async fn listen(&mut self) -> Result<u64, ListenerError> {
        Listener::listen(self).await
    }
}
