// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use chrono::{Duration, Utc};
use std::path::PathBuf;
use tandem_core::{BatchLock, Instance, InstanceId, InstanceStatus};
use tandem_store::{CoordinationStore, FileStore, Precondition};
use tempfile::TempDir;

/// A temp directory with a config pointing at a file store inside it.
pub struct TestEnv {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub store: FileStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store_path = dir.path().join("state.json");
        let config_path = dir.path().join("tandem.toml");
        std::fs::write(
            &config_path,
            format!(
                "[coordination]\nheartbeat_timeout = \"90s\"\n\n[store]\nkind = \"file\"\npath = \"{}\"\n",
                store_path.display()
            ),
        )
        .expect("Failed to write config");
        let store = FileStore::open(store_path).expect("Failed to open store");
        Self {
            dir,
            config_path,
            store,
        }
    }

    /// `tandem --config <this env's config>`
    pub fn tandem(&self) -> Command {
        let mut cmd = Command::cargo_bin("tandem").expect("tandem binary");
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }

    /// Register an instance whose last heartbeat was `age_secs` ago
    pub async fn instance(&self, id: &str, age_secs: i64) {
        let at = Utc::now() - Duration::seconds(age_secs);
        let instance = Instance::register(InstanceId::new(id), "test-host", "1.0.0", at);
        self.store
            .put_instance(&instance, Precondition::Any)
            .await
            .expect("put instance");
    }

    /// Register an instance already marked stopped
    pub async fn stopped_instance(&self, id: &str) {
        let instance = Instance::register(InstanceId::new(id), "test-host", "1.0.0", Utc::now())
            .with_status(InstanceStatus::Stopped);
        self.store
            .put_instance(&instance, Precondition::Any)
            .await
            .expect("put instance");
    }

    /// Write a lock on `batch_id` whose lease ends `expires_in_secs` from now
    pub async fn lock(&self, batch_id: &str, holder: &str, expires_in_secs: i64) {
        let now = Utc::now();
        let lock = BatchLock {
            batch_id: batch_id.to_string(),
            holder_instance_id: InstanceId::new(holder),
            acquired_at: now - Duration::seconds(10),
            expires_at: now + Duration::seconds(expires_in_secs),
            operation_label: "score".to_string(),
        };
        self.store
            .put_lock(&lock, Precondition::Any)
            .await
            .expect("put lock");
    }

    pub async fn lock_exists(&self, batch_id: &str) -> bool {
        self.store
            .get_lock(batch_id)
            .await
            .expect("get lock")
            .is_some()
    }

    pub async fn status(&self, id: &str) -> InstanceStatus {
        self.store
            .get_instance(&InstanceId::new(id))
            .await
            .expect("get instance")
            .expect("instance exists")
            .record
            .status
    }
}
