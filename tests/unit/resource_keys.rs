//! Unit tests for resource keys and checkpoint file format

use order_desk_client::checkpoint::{CheckpointError, CheckpointStore};
use order_desk_client::{KeyKind, ResourceKey, ResourceType};
use tempfile::TempDir;

#[test]
fn test_key_parsing_per_kind() {
    assert_eq!(
        ResourceKey::parse("17", KeyKind::Sequential).unwrap(),
        ResourceKey::Number(17)
    );
    assert_eq!(
        ResourceKey::parse("17:2", KeyKind::Revisioned).unwrap(),
        ResourceKey::Revision(17, Some(2))
    );
    assert_eq!(
        ResourceKey::parse("17", KeyKind::Revisioned).unwrap(),
        ResourceKey::Revision(17, None)
    );
    assert!(ResourceKey::parse("17:2", KeyKind::Sequential).is_err());
    assert!(ResourceKey::parse("x", KeyKind::Sequential).is_err());
}

#[test]
fn test_zero_keys() {
    assert_eq!(KeyKind::Sequential.zero(), ResourceKey::Number(0));
    assert_eq!(KeyKind::Revisioned.zero(), ResourceKey::Revision(0, None));
}

#[test]
fn test_checkpoint_file_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoints.json");
    {
        let mut store = CheckpointStore::open(&path).unwrap();
        store.record(&ResourceType::order(), ResourceKey::Number(3), true).unwrap();
        store
            .record(&ResourceType::quote(), ResourceKey::Revision(4, None), false)
            .unwrap();
    }

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["schema_version"], "1.0.0");
    assert_eq!(json["next_seq"], 3);

    let order = &json["records"]["Order"][0];
    assert_eq!(order["id"], 3);
    assert_eq!(order["s"], true);
    assert_eq!(order["seq"], 1);
    assert!(order["dt"].is_string());

    let quote = &json["records"]["Quote"][0];
    assert_eq!(quote["id"], serde_json::json!([4, null]));
    assert_eq!(quote["s"], false);
}

#[test]
fn test_legacy_file_is_migrated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoints.json");
    std::fs::write(
        &path,
        r#"{"Order": [
            {"id": 1, "dt": "2024-01-01T00:00:00Z", "s": true},
            {"id": 2, "dt": "2024-01-01T00:00:00Z", "s": true}
        ]}"#,
    )
    .unwrap();

    let store = CheckpointStore::open(&path).unwrap();
    // Equal timestamps: the later entry wins
    assert_eq!(
        store.last_processed(&ResourceType::order()),
        Some(ResourceKey::Number(2))
    );
}

#[test]
fn test_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoints.json");

    let _first = CheckpointStore::open(&path).unwrap();
    assert!(matches!(
        CheckpointStore::open(&path),
        Err(CheckpointError::Locked(_))
    ));
}
