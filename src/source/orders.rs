//! Order source: sequential integer keys

use super::http::ApiClient;
use super::{ResourceSource, SourceError, SourceResult};
use crate::key::{KeyKind, Keyed, ResourceKey, ResourceType};
use crate::Order;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Polls `/orders/{n}` for the order after the checkpoint
pub struct OrderSource {
    client: Arc<ApiClient>,
    lookahead: u64,
}

impl OrderSource {
    /// Create a source that only asks for the next order number
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            lookahead: 0,
        }
    }

    /// Also probe up to `lookahead` numbers past a missing one
    ///
    /// Lets the listener step over order numbers that were deleted or never
    /// assigned instead of waiting on them forever.
    pub fn with_lookahead(mut self, lookahead: u64) -> Self {
        self.lookahead = lookahead;
        self
    }
}

#[async_trait]
impl ResourceSource for OrderSource {
    type Resource = Order;

    fn resource_type(&self) -> ResourceType {
        ResourceType::order()
    }

    fn key_kind(&self) -> KeyKind {
        KeyKind::Sequential
    }

    async fn fetch_after(&self, key: &ResourceKey) -> SourceResult<Option<Order>> {
        let next = match key {
            ResourceKey::Number(_) => key.number().saturating_add(1),
            ResourceKey::Revision(..) => {
                return Err(SourceError::InvalidKey(format!(
                    "orders use plain numbers, got revisioned key {key}"
                )))
            }
        };

        for number in next..=next.saturating_add(self.lookahead) {
            if let Some(order) = self.client.get::<Order>(&ResourceKey::Number(number)).await? {
                if number != next {
                    debug!(skipped_from = next, found = number, "Skipped missing order numbers");
                }
                return Ok(Some(order));
            }
        }
        Ok(None)
    }

    async fn most_recent_key(&self) -> SourceResult<Option<ResourceKey>> {
        let newest = self
            .client
            .list::<Order>(&[("sort", "-number".to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(newest.first().map(Keyed::unique_identifier))
    }
}
