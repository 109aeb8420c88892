// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for operator commands
//!
//! Each test seeds a file store directly, then runs the `tandem` binary
//! against it.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::TestEnv;
use predicates::prelude::*;
use tandem_core::InstanceStatus;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("tandem")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("instances"))
        .stdout(predicate::str::contains("locks"))
        .stdout(predicate::str::contains("holder"))
        .stdout(predicate::str::contains("reap"))
        .stdout(predicate::str::contains("release"));
}

#[test]
fn test_missing_config_fails() {
    let env = TestEnv::new();
    Command::cargo_bin("tandem")
        .unwrap()
        .args(["--config"])
        .arg(env.dir.path().join("missing.toml"))
        .arg("locks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn test_memory_store_is_rejected() {
    let env = TestEnv::new();
    let path = env.dir.path().join("memory.toml");
    std::fs::write(&path, "[store]\nkind = \"memory\"\n").unwrap();

    Command::cargo_bin("tandem")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("instances")
        .assert()
        .failure()
        .stderr(predicate::str::contains("process-local"));
}

#[test]
fn test_empty_store() {
    let env = TestEnv::new();
    env.tandem()
        .arg("instances")
        .assert()
        .success()
        .stdout(predicate::str::contains("No instances"));
    env.tandem()
        .arg("locks")
        .assert()
        .success()
        .stdout(predicate::str::contains("No locks"));
}

#[tokio::test]
async fn test_instances_shows_liveness() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;
    env.instance("worker-dead", 600).await;

    env.tandem()
        .arg("instances")
        .assert()
        .success()
        .stdout(predicate::str::contains("worker-live"))
        .stdout(predicate::str::contains("worker-dead"));

    env.tandem()
        .args(["instances", "--alive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("worker-live"))
        .stdout(predicate::str::contains("worker-dead").not());
}

#[tokio::test]
async fn test_instances_json() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;

    let output = env
        .tandem()
        .args(["--format", "json", "instances"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["instance_id"], "worker-live");
    assert_eq!(rows[0]["status"], "active");
    assert_eq!(rows[0]["alive"], true);
}

#[tokio::test]
async fn test_locks_classify_state() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;
    env.instance("worker-dead", 600).await;
    env.lock("batch-held", "worker-live", 200).await;
    env.lock("batch-orphan", "worker-dead", 200).await;
    env.lock("batch-stale", "worker-live", -30).await;

    let output = env
        .tandem()
        .args(["--format", "json", "locks"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let states: Vec<(&str, &str)> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["batch_id"].as_str().unwrap(), r["state"].as_str().unwrap()))
        .collect();
    assert_eq!(
        states,
        vec![
            ("batch-held", "held"),
            ("batch-orphan", "orphaned"),
            ("batch-stale", "expired"),
        ]
    );
}

#[tokio::test]
async fn test_holder_ignores_expired_lock() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;
    env.lock("batch-1", "worker-live", 200).await;
    env.lock("batch-2", "worker-live", -1).await;

    env.tandem()
        .args(["holder", "batch-1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("worker-live\n"));
    env.tandem()
        .args(["holder", "batch-2"])
        .assert()
        .success()
        .stdout(predicate::str::diff("none\n"));
    env.tandem()
        .args(["holder", "batch-3"])
        .assert()
        .success()
        .stdout(predicate::str::diff("none\n"));
}

#[tokio::test]
async fn test_reap_stops_dead_instances_and_frees_locks() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;
    env.instance("worker-dead", 600).await;
    env.stopped_instance("worker-gone").await;
    env.lock("batch-live", "worker-live", 200).await;
    env.lock("batch-dead", "worker-dead", 200).await;

    env.tandem()
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reaped 1 dead instance(s)"));

    assert_eq!(env.status("worker-dead").await, InstanceStatus::Stopped);
    assert_eq!(env.status("worker-live").await, InstanceStatus::Active);
    assert!(env.lock_exists("batch-live").await);
    assert!(!env.lock_exists("batch-dead").await);

    env.tandem()
        .arg("reap")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reaped 0 dead instance(s)"));
}

#[tokio::test]
async fn test_release_refuses_live_holder_without_force() {
    let env = TestEnv::new();
    env.instance("worker-live", 5).await;
    env.lock("batch-1", "worker-live", 200).await;

    env.tandem()
        .args(["release", "batch-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to release lock 'batch-1'"))
        .stderr(predicate::str::contains("--force"));
    assert!(env.lock_exists("batch-1").await);

    env.tandem()
        .args(["release", "batch-1", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released batch-1 (held by worker-live)"))
        .stderr(predicate::str::contains("lock force-released"));
    assert!(!env.lock_exists("batch-1").await);
}

#[tokio::test]
async fn test_release_dead_holder_without_force() {
    let env = TestEnv::new();
    env.instance("worker-dead", 600).await;
    env.lock("batch-1", "worker-dead", 200).await;

    env.tandem()
        .args(["release", "batch-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released batch-1 (held by worker-dead)"));
    assert!(!env.lock_exists("batch-1").await);
}

#[test]
fn test_release_without_lock() {
    let env = TestEnv::new();
    env.tandem()
        .args(["release", "batch-9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No lock on batch-9"));
}
