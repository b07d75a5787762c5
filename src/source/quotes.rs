//! Quote source: `(number, revision)` keys

use super::http::ApiClient;
use super::parser::parse_resource;
use super::{ResourceSource, SourceError, SourceResult};
use crate::key::{KeyKind, Keyed, ResourceKey, ResourceType};
use crate::Quote;
use async_trait::async_trait;
use std::sync::Arc;

/// Endpoint answering "first quote newer than (number, revision)"
const NEXT_QUOTE_PATH: &str = "/quotes/next";

/// Polls the API's "next quote" query
///
/// Revisions of older quote numbers can appear after newer quote numbers, so
/// there is no local successor computation; the API decides what is newer.
pub struct QuoteSource {
    client: Arc<ApiClient>,
}

impl QuoteSource {
    /// Create a quote source
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceSource for QuoteSource {
    type Resource = Quote;

    fn resource_type(&self) -> ResourceType {
        ResourceType::quote()
    }

    fn key_kind(&self) -> KeyKind {
        KeyKind::Revisioned
    }

    async fn fetch_after(&self, key: &ResourceKey) -> SourceResult<Option<Quote>> {
        let (number, revision) = match key {
            ResourceKey::Revision(number, revision) => (*number, *revision),
            ResourceKey::Number(_) => {
                return Err(SourceError::InvalidKey(format!(
                    "quotes use (number, revision) keys, got {key}"
                )))
            }
        };

        let mut params = vec![("number", number.to_string())];
        if let Some(revision) = revision {
            params.push(("revision", revision.to_string()));
        }

        match self.client.fetch(NEXT_QUOTE_PATH, &params).await? {
            Some(value) => parse_resource(value).map(Some),
            None => Ok(None),
        }
    }

    async fn most_recent_key(&self) -> SourceResult<Option<ResourceKey>> {
        let newest = self
            .client
            .list::<Quote>(&[("sort", "-createdAt".to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(newest.first().map(Keyed::unique_identifier))
    }
}
