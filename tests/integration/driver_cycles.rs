//! Integration tests for the driver loop over real listeners

use crate::support::memory_source::{MemorySource, Ticket};
use order_desk_client::checkpoint::CheckpointStore;
use order_desk_client::listener::{Driver, Listener};
use order_desk_client::shutdown::ShutdownCoordinator;
use order_desk_client::{ResourceKey, ResourceType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn counting(count: Arc<AtomicUsize>) -> impl Fn(&Ticket) -> anyhow::Result<()> + Send + Sync {
    move |_: &Ticket| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_offline_source_does_not_block_other_listener() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::open_shared(dir.path().join("checkpoints.json")).unwrap();

    let offline = MemorySource::with_keys([1, 2]);
    offline.set_offline(true);
    let online = MemorySource::with_keys([1, 2, 3]);

    let offline_count = Arc::new(AtomicUsize::new(0));
    let online_count = Arc::new(AtomicUsize::new(0));

    let mut driver = Driver::new(Duration::from_secs(1));
    driver.add_listener(
        Listener::new(offline.clone(), store.clone(), counting(offline_count.clone()))
            .with_resource_type(ResourceType::parse("Offline").unwrap())
            .with_default_key(ResourceKey::Number(0)),
    );
    driver.add_listener(
        Listener::new(online, store.clone(), counting(online_count.clone()))
            .with_default_key(ResourceKey::Number(0)),
    );

    let report = driver.run_cycle().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.total_processed(), 3);
    assert_eq!(online_count.load(Ordering::SeqCst), 3);

    // Same listener recovers on the next cycle
    offline.set_offline(false);
    let report = driver.run_cycle().await.unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(offline_count.load(Ordering::SeqCst), 2);
    assert_eq!(
        store
            .lock()
            .await
            .last_processed(&ResourceType::parse("Offline").unwrap()),
        Some(ResourceKey::Number(2))
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_resources_picked_up_on_later_cycle() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::open_shared(dir.path().join("checkpoints.json")).unwrap();
    let source = MemorySource::with_keys([1]);
    let count = Arc::new(AtomicUsize::new(0));
    let shutdown = ShutdownCoordinator::shared();

    let mut driver = Driver::new(Duration::from_secs(30)).with_shutdown(shutdown.clone());
    driver.add_listener(Listener::new(source.clone(), store, counting(count.clone())));

    let feeder = {
        let source = source.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            source.insert([2, 3]);
            tokio::time::sleep(Duration::from_secs(40)).await;
            shutdown.request_shutdown();
        })
    };

    driver.run().await.unwrap();
    feeder.await.unwrap();

    // Key 1 predates the first poll and is skipped; 2 and 3 arrive at t=30
    assert_eq!(count.load(Ordering::SeqCst), 2);
}
