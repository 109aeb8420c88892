// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for coordinator tests

use crate::Coordinator;
use std::time::Duration;
use tandem_core::{CoordinationConfig, FakeClock};
use tandem_store::MemoryStore;

pub type TestStore = MemoryStore<FakeClock>;

/// Lease and heartbeat timeout are judged on the fake clock. Retry delays
/// are real but short, and the real 60s heartbeat never fires during a test.
pub fn test_config() -> CoordinationConfig {
    CoordinationConfig::new()
        .with_heartbeat_interval(Duration::from_secs(60))
        .with_heartbeat_timeout(Duration::from_secs(90))
        .with_lock_lease(Duration::from_secs(300))
        .with_lock_retry_delay(Duration::from_millis(5))
        .with_max_lock_retries(1000)
}

pub fn store() -> (TestStore, FakeClock) {
    let clock = FakeClock::new();
    (MemoryStore::with_clock(clock.clone()), clock)
}

pub fn coordinator(store: &TestStore, id: &str) -> Coordinator<TestStore> {
    coordinator_with(store, id, test_config())
}

pub fn coordinator_with(
    store: &TestStore,
    id: &str,
    config: CoordinationConfig,
) -> Coordinator<TestStore> {
    Coordinator::builder(store.clone())
        .config(config)
        .instance_id(id)
        .host_label("test-host")
        .version("test")
        .build()
        .unwrap()
}

pub async fn started(store: &TestStore, id: &str) -> Coordinator<TestStore> {
    let coordinator = coordinator(store, id);
    coordinator.start().await.unwrap();
    coordinator
}
