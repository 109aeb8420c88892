// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for scenario specs.

#![allow(dead_code)]

use std::time::Duration;
use tandem_coord::Coordinator;
use tandem_core::{CoordinationConfig, Event, FakeClock};
use tandem_store::{CoordinationStore, MemoryStore};
use tokio::sync::broadcast;

pub type SharedStore = MemoryStore<FakeClock>;

/// Heartbeat timeout 90s and lease 300s, judged on the fake clock.
/// Retries are real and short.
pub fn config() -> CoordinationConfig {
    CoordinationConfig::new()
        .with_heartbeat_interval(Duration::from_secs(30))
        .with_heartbeat_timeout(Duration::from_secs(90))
        .with_lock_lease(Duration::from_secs(300))
        .with_lock_retry_delay(Duration::from_millis(1))
        .with_max_lock_retries(10_000)
}

pub fn shared_store() -> (SharedStore, FakeClock) {
    let clock = FakeClock::new();
    (MemoryStore::with_clock(clock.clone()), clock)
}

/// A started coordinator named `id` on `store`
pub async fn instance<S: CoordinationStore>(store: &S, id: &str) -> Coordinator<S> {
    let coordinator = Coordinator::builder(store.clone())
        .config(config())
        .instance_id(id)
        .host_label("scenario-host")
        .build()
        .unwrap();
    coordinator.start().await.unwrap();
    coordinator
}

/// Names of every event received so far
pub fn drain_names(rx: &mut broadcast::Receiver<Event>) -> Vec<&'static str> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.name())
        .collect()
}
