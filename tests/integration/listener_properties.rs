//! Integration tests for listener delivery guarantees

use crate::support::memory_source::{MemorySource, Ticket};
use order_desk_client::checkpoint::{CheckpointStore, SharedStore};
use order_desk_client::listener::Listener;
use order_desk_client::{ResourceKey, ResourceType};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn ticket_type() -> ResourceType {
    ResourceType::parse("Ticket").unwrap()
}

fn open(path: &Path) -> SharedStore {
    CheckpointStore::open_shared(path.join("checkpoints.json")).unwrap()
}

/// Handler that remembers every key it was given and fails on `fail_on`
fn recorder(
    seen: Arc<Mutex<Vec<u64>>>,
    fail_on: Option<u64>,
) -> impl Fn(&Ticket) -> anyhow::Result<()> + Send + Sync {
    move |ticket: &Ticket| {
        seen.lock().unwrap().push(ticket.0);
        if Some(ticket.0) == fail_on {
            anyhow::bail!("ticket {} is poisoned", ticket.0);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_each_key_handled_once_in_order() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let source = MemorySource::with_keys(1..=5);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut listener = Listener::new(source, store.clone(), recorder(seen.clone(), Some(2)))
        .with_default_key(ResourceKey::Number(0));

    assert_eq!(listener.listen().await.unwrap(), 5);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);

    // Draining again delivers nothing new
    assert_eq!(listener.listen().await.unwrap(), 0);
    assert_eq!(seen.lock().unwrap().len(), 5);

    let store = store.lock().await;
    let outcomes: Vec<bool> = store
        .records(&ticket_type())
        .iter()
        .map(|r| r.success())
        .collect();
    assert_eq!(outcomes, vec![true, false, true, true, true]);
}

#[tokio::test]
async fn test_restart_resumes_after_checkpoint() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(dir.path());
        let mut store = store.lock().await;
        for key in 1..=5 {
            store.record(&ticket_type(), ResourceKey::Number(key), true).unwrap();
        }
    }

    // New process: store reopened from disk, fresh listener
    let store = open(dir.path());
    let source = MemorySource::with_keys(1..=7);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source.clone(), store, recorder(seen.clone(), None));

    assert_eq!(listener.listen().await.unwrap(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![6, 7]);
    // An existing checkpoint means the default is never needed
    assert_eq!(source.most_recent_calls(), 0);
}

#[tokio::test]
async fn test_default_resolution_queries_source_once() {
    let dir = TempDir::new().unwrap();
    let source = MemorySource::with_keys(1..=3);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source.clone(), open(dir.path()), recorder(seen.clone(), None));

    assert_eq!(listener.resolved_default().await.unwrap(), ResourceKey::Number(3));
    assert!(!listener.poll_once().await.unwrap());
    assert_eq!(listener.resolved_default().await.unwrap(), ResourceKey::Number(3));
    assert_eq!(source.most_recent_calls(), 1);

    // Resources created after the first poll are delivered
    source.insert([4]);
    assert!(listener.poll_once().await.unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![4]);
    assert_eq!(source.most_recent_calls(), 1);
}

#[tokio::test]
async fn test_handler_failure_advances_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let source = MemorySource::with_keys(1..=4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source, store.clone(), recorder(seen.clone(), Some(3)))
        .with_default_key(ResourceKey::Number(2));

    assert!(listener.poll_once().await.unwrap());
    assert_eq!(
        store.lock().await.last_processed(&ticket_type()),
        Some(ResourceKey::Number(3))
    );

    assert!(listener.poll_once().await.unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
}

#[tokio::test]
async fn test_not_found_ends_drain_without_extra_fetch() {
    let dir = TempDir::new().unwrap();
    let source = MemorySource::with_keys([1, 2]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source.clone(), open(dir.path()), recorder(seen, None))
        .with_default_key(ResourceKey::Number(0));

    assert_eq!(listener.listen().await.unwrap(), 2);
    // Fetches for 1, 2 and the NotFound for 3; nothing after that
    assert_eq!(source.fetch_calls(), 3);
}

#[tokio::test]
async fn test_transport_error_leaves_checkpoint_for_next_cycle() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let source = MemorySource::with_keys([1, 2]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source.clone(), store.clone(), recorder(seen.clone(), None))
        .with_default_key(ResourceKey::Number(0));

    source.set_offline(true);
    let err = listener.listen().await.unwrap_err();
    assert!(!err.is_fatal());
    assert!(store.lock().await.records(&ticket_type()).is_empty());

    source.set_offline(false);
    assert_eq!(listener.listen().await.unwrap(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_composite_checkpoint_follows_timestamps() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let mut store = store.lock().await;
    let quote = ResourceType::quote();
    let later = chrono::Utc::now();
    let earlier = later - chrono::Duration::minutes(5);

    store
        .record_at(&quote, ResourceKey::Revision(11, Some(2)), true, earlier)
        .unwrap();
    store
        .record_at(&quote, ResourceKey::Revision(10, None), true, later)
        .unwrap();

    assert_eq!(store.last_processed(&quote), Some(ResourceKey::Revision(10, None)));
}

#[tokio::test]
async fn test_empty_source_then_three_resources() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let source = MemorySource::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut listener = Listener::new(source.clone(), store.clone(), recorder(seen.clone(), None));

    assert_eq!(listener.resolved_default().await.unwrap(), ResourceKey::Number(0));

    source.insert([1, 2, 3]);
    assert!(listener.poll_once().await.unwrap());
    assert!(listener.poll_once().await.unwrap());
    assert!(listener.poll_once().await.unwrap());
    assert!(!listener.poll_once().await.unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);

    let store = store.lock().await;
    let records = store.records(&ticket_type());
    let keys: Vec<ResourceKey> = records.iter().map(|r| r.resource_key()).collect();
    assert_eq!(
        keys,
        vec![
            ResourceKey::Number(1),
            ResourceKey::Number(2),
            ResourceKey::Number(3)
        ]
    );
    for pair in records.windows(2) {
        assert!(pair[0].recency() < pair[1].recency());
    }
}
