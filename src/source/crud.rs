//! CRUD wrappers over [`ApiClient`]

use super::http::ApiClient;
use super::parser::{parse_collection, parse_resource};
use super::resources::ApiResource;
use super::{SourceError, SourceResult};
use crate::key::ResourceKey;
use reqwest::Method;
use tracing::{debug, info};

impl ApiClient {
    /// Fetch one resource, `Ok(None)` if it does not exist
    pub async fn get<R: ApiResource>(&self, key: &ResourceKey) -> SourceResult<Option<R>> {
        match self.fetch(&R::member_path(key), &[]).await? {
            Some(value) => parse_resource(value).map(Some),
            None => Ok(None),
        }
    }

    /// List a collection with query parameters (filters, sorting, paging)
    pub async fn list<R: ApiResource>(&self, params: &[(&str, String)]) -> SourceResult<Vec<R>> {
        match self.fetch(R::COLLECTION_PATH, params).await? {
            Some(value) => parse_collection(value),
            None => Err(SourceError::Http(format!(
                "collection {} not found",
                R::COLLECTION_PATH
            ))),
        }
    }

    /// Create a resource, returning the stored representation
    pub async fn create<R: ApiResource>(&self, resource: &R) -> SourceResult<R> {
        let body = serde_json::to_value(resource)
            .map_err(|e| SourceError::Parse(format!("Failed to encode {}: {e}", R::TYPE_NAME)))?;
        let value = self
            .request(Method::POST, R::COLLECTION_PATH, &[], Some(&body))
            .await?
            .ok_or_else(|| SourceError::Http(format!("collection {} not found", R::COLLECTION_PATH)))?;
        let created: R = parse_resource(value)?;
        info!(
            resource_type = R::TYPE_NAME,
            key = %created.unique_identifier(),
            "Created resource"
        );
        Ok(created)
    }

    /// Replace a resource and return the API's view of it
    ///
    /// The input is left untouched; the returned value is built from the response.
    pub async fn update<R: ApiResource>(&self, resource: &R) -> SourceResult<R> {
        let key = resource.unique_identifier();
        let body = serde_json::to_value(resource)
            .map_err(|e| SourceError::Parse(format!("Failed to encode {}: {e}", R::TYPE_NAME)))?;
        let value = self
            .request(Method::PUT, &R::member_path(&key), &[], Some(&body))
            .await?
            .ok_or_else(|| SourceError::Http(format!("{} {key} not found", R::TYPE_NAME)))?;
        debug!(resource_type = R::TYPE_NAME, key = %key, "Updated resource");
        parse_resource(value)
    }

    /// Delete a resource; `Ok(false)` if it did not exist
    pub async fn delete<R: ApiResource>(&self, key: &ResourceKey) -> SourceResult<bool> {
        let deleted = self
            .request(Method::DELETE, &R::member_path(key), &[], None)
            .await?
            .is_some();
        debug!(resource_type = R::TYPE_NAME, key = %key, deleted, "Deleted resource");
        Ok(deleted)
    }
}
