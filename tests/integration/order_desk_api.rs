//! Integration tests for the API client and HTTP-backed sources

use crate::support::mock_api::{at, order, MockApi, PASSWORD, USERNAME};
use axum::http::StatusCode;
use order_desk_client::checkpoint::CheckpointStore;
use order_desk_client::listener::Listener;
use order_desk_client::source::{
    ApiClient, ApiConfig, OrderSource, QuoteSource, ResourceSource, SourceError,
};
use order_desk_client::{Order, OrderStatus, Quote, ResourceKey, ResourceType};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn config(api: &MockApi) -> ApiConfig {
    ApiConfig::new(&api.base_url)
        .with_max_retries(2)
        .with_initial_backoff(Duration::from_millis(5))
}

fn client(api: &MockApi) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(config(api).with_credentials(USERNAME, PASSWORD)).unwrap())
}

#[tokio::test]
async fn test_missing_order_is_none_not_error() {
    let api = MockApi::start().await;
    let client = client(&api);

    let missing = client.get::<Order>(&ResourceKey::Number(99)).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_token_reused_until_expired() {
    let api = MockApi::start().await;
    api.require_auth().await;
    api.insert_order(1).await;
    let client = client(&api);

    client.get::<Order>(&ResourceKey::Number(1)).await.unwrap().unwrap();
    client.get::<Order>(&ResourceKey::Number(1)).await.unwrap().unwrap();
    assert_eq!(api.tokens_issued().await, 1);

    api.expire_token().await;
    let err = client.get::<Order>(&ResourceKey::Number(1)).await.unwrap_err();
    assert!(matches!(err, SourceError::AuthExpired(_)));

    // The rejected token was dropped, so the next call logs in again
    client.get::<Order>(&ResourceKey::Number(1)).await.unwrap().unwrap();
    assert_eq!(api.tokens_issued().await, 2);
}

#[tokio::test]
async fn test_wrong_password_is_authentication_error() {
    let api = MockApi::start().await;
    api.require_auth().await;
    let client = ApiClient::new(config(&api).with_credentials(USERNAME, "wrong")).unwrap();

    assert!(matches!(
        client.authenticate().await,
        Err(SourceError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let api = MockApi::start().await;
    api.insert_order(1).await;
    api.fail_next([StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS])
        .await;
    let client = client(&api);

    let order = client.get::<Order>(&ResourceKey::Number(1)).await.unwrap();
    assert_eq!(order.unwrap().number, 1);
    assert_eq!(api.requests().await.len(), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let api = MockApi::start().await;
    api.fail_next([StatusCode::BAD_GATEWAY; 3]).await;
    let client = client(&api);

    let err = client.get::<Order>(&ResourceKey::Number(1)).await.unwrap_err();
    assert!(matches!(err, SourceError::Http(_)));
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let api = MockApi::start().await;
    api.fail_next([StatusCode::UNPROCESSABLE_ENTITY]).await;
    let client = client(&api);

    let err = client.get::<Order>(&ResourceKey::Number(1)).await.unwrap_err();
    assert!(matches!(err, SourceError::Http(_)));
    assert_eq!(api.requests().await.len(), 1);
}

#[tokio::test]
async fn test_order_crud() {
    let api = MockApi::start().await;
    api.insert_order(1).await;
    let client = client(&api);

    let created = client.create(&order(0)).await.unwrap();
    assert_eq!(created.number, 2);

    let updated = client.update(&created).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Confirmed);
    // The input is left untouched
    assert_eq!(created.status, OrderStatus::Pending);

    let listed = client.list::<Order>(&[]).await.unwrap();
    assert_eq!(listed.len(), 2);

    assert!(client.delete::<Order>(&ResourceKey::Number(2)).await.unwrap());
    assert!(!client.delete::<Order>(&ResourceKey::Number(2)).await.unwrap());
}

#[tokio::test]
async fn test_order_source_most_recent_and_lookahead() {
    let api = MockApi::start().await;
    for number in [1, 2, 4] {
        api.insert_order(number).await;
    }
    let client = client(&api);

    let source = OrderSource::new(client.clone());
    assert_eq!(source.most_recent_key().await.unwrap(), Some(ResourceKey::Number(4)));
    // Without lookahead a gap looks like "caught up"
    assert!(source.fetch_after(&ResourceKey::Number(2)).await.unwrap().is_none());

    let source = OrderSource::new(client).with_lookahead(2);
    let next = source.fetch_after(&ResourceKey::Number(2)).await.unwrap().unwrap();
    assert_eq!(next.number, 4);

    assert!(matches!(
        source.fetch_after(&ResourceKey::Revision(2, None)).await,
        Err(SourceError::InvalidKey(_))
    ));
}

#[tokio::test]
async fn test_quote_source_walks_revisions() {
    let api = MockApi::start().await;
    api.insert_quote(10, None, at(0)).await;
    api.insert_quote(10, Some(1), at(50)).await;
    api.insert_quote(11, None, at(20)).await;
    let client = client(&api);
    let source = QuoteSource::new(client);

    // Newest by creation time, not by number
    assert_eq!(
        source.most_recent_key().await.unwrap(),
        Some(ResourceKey::Revision(10, Some(1)))
    );

    let next = source
        .fetch_after(&ResourceKey::Revision(10, None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((next.number, next.revision), (10, Some(1)));

    let next = source
        .fetch_after(&ResourceKey::Revision(10, Some(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((next.number, next.revision), (11, None));

    assert!(source
        .fetch_after(&ResourceKey::Revision(11, None))
        .await
        .unwrap()
        .is_none());
    assert!(api
        .requests()
        .await
        .contains(&"/quotes/next?number=10&revision=1".to_string()));
}

#[tokio::test]
async fn test_order_listener_against_api() {
    let api = MockApi::start().await;
    api.require_auth().await;
    for number in 1..=3 {
        api.insert_order(number).await;
    }
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::open_shared(dir.path().join("checkpoints.json")).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handler = {
        let seen = seen.clone();
        move |order: &Order| -> anyhow::Result<()> {
            seen.lock().unwrap().push(order.number);
            Ok(())
        }
    };
    let mut listener = Listener::new(OrderSource::new(client(&api)), store.clone(), handler);

    // Existing orders are skipped
    assert_eq!(listener.listen().await.unwrap(), 0);

    api.insert_order(4).await;
    api.insert_order(5).await;
    assert_eq!(listener.listen().await.unwrap(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![4, 5]);

    // Auth expiry ends the drain without recording anything
    api.expire_token().await;
    api.insert_order(6).await;
    let err = listener.listen().await.unwrap_err();
    assert_eq!(err.kind(), "auth");
    assert_eq!(
        store.lock().await.last_processed(&ResourceType::order()),
        Some(ResourceKey::Number(5))
    );

    assert_eq!(listener.listen().await.unwrap(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![4, 5, 6]);
}

#[tokio::test]
async fn test_quote_listener_against_api() {
    let api = MockApi::start().await;
    api.insert_quote(7, None, at(0)).await;
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::open_shared(dir.path().join("checkpoints.json")).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handler = {
        let seen = seen.clone();
        move |quote: &Quote| -> anyhow::Result<()> {
            seen.lock().unwrap().push((quote.number, quote.revision));
            Ok(())
        }
    };
    let mut listener = Listener::new(QuoteSource::new(client(&api)), store.clone(), handler);
    assert_eq!(listener.listen().await.unwrap(), 0);

    api.insert_quote(7, Some(1), at(10)).await;
    api.insert_quote(8, None, at(20)).await;
    assert_eq!(listener.listen().await.unwrap(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![(7, Some(1)), (8, None)]);
    assert_eq!(
        store.lock().await.last_processed(&ResourceType::quote()),
        Some(ResourceKey::Revision(8, None))
    );
}
