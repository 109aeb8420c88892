// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;
use tempfile::TempDir;

fn lock(batch_id: &str, holder: &str, now: DateTime<Utc>) -> BatchLock {
    BatchLock {
        batch_id: batch_id.to_string(),
        holder_instance_id: InstanceId::new(holder),
        acquired_at: now,
        expires_at: now + Duration::seconds(300),
        operation_label: "score".to_string(),
    }
}

#[tokio::test]
async fn memory_config_opens_memory_store() {
    let store = AnyStore::open(&StoreConfig::Memory).unwrap();
    assert_eq!(store.kind(), "memory");
    assert!(store.scan_locks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_config_persists_across_opens() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::File {
        path: dir.path().join("nested").join("state.json"),
    };

    let first = AnyStore::open(&config).unwrap();
    assert_eq!(first.kind(), "file");
    let now = first.server_time().await.unwrap();
    first
        .put_lock(&lock("b1", "i1", now), Precondition::Absent)
        .await
        .unwrap();

    let second = AnyStore::open(&config).unwrap();
    let found = second.get_lock("b1").await.unwrap().unwrap();
    assert_eq!(found.record.holder_instance_id, InstanceId::new("i1"));
    assert!(second
        .delete_lock("b1", Precondition::Version(found.version))
        .await
        .unwrap());
}
