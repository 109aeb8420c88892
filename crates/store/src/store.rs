// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination store trait
//!
//! The only state shared between instances lives behind this trait. Every
//! mutation is a single conditional write keyed on the record version, which
//! gives the same guarantee as a per-record read-modify-write transaction:
//! a writer that read a stale version loses with [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::{BatchLock, Instance, InstanceId, InstanceStatus};
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conditional write on {collection}/{key} lost: record changed")]
    Conflict {
        collection: &'static str,
        key: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// A lost conditional write, as opposed to a transport failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// A record together with the version the store assigned to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// Condition a write must satisfy to be applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Write unconditionally
    Any,
    /// Only create; fail if the record exists
    Absent,
    /// Only overwrite the exact version previously read
    Version(u64),
}

impl Precondition {
    /// Whether a record currently at `current` satisfies this condition
    pub fn holds(&self, current: Option<u64>) -> bool {
        match (self, current) {
            (Precondition::Any, _) => true,
            (Precondition::Absent, None) => true,
            (Precondition::Absent, Some(_)) => false,
            (Precondition::Version(_), None) => false,
            (Precondition::Version(expected), Some(actual)) => *expected == actual,
        }
    }
}

/// Transactional record store shared by all instances
///
/// Two record sets: `instances` keyed by instance id and `batch_locks` keyed
/// by batch id.
#[async_trait]
pub trait CoordinationStore: Clone + Send + Sync + 'static {
    /// Store-assigned timestamp used for heartbeats and lease math
    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError>;

    async fn get_instance(&self, id: &InstanceId)
        -> Result<Option<Versioned<Instance>>, StoreError>;

    /// Write an instance record; returns the new version
    async fn put_instance(
        &self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError>;

    /// All instances, optionally filtered by status
    async fn scan_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Versioned<Instance>>, StoreError>;

    async fn get_lock(&self, batch_id: &str) -> Result<Option<Versioned<BatchLock>>, StoreError>;

    /// Write a lock record; returns the new version
    async fn put_lock(&self, lock: &BatchLock, expected: Precondition)
        -> Result<u64, StoreError>;

    /// Delete a lock record.
    ///
    /// Returns `false` when there was nothing to delete and
    /// [`StoreError::Conflict`] when the record exists but fails `expected`.
    async fn delete_lock(&self, batch_id: &str, expected: Precondition)
        -> Result<bool, StoreError>;

    /// All locks, optionally filtered by holder
    async fn scan_locks(
        &self,
        holder: Option<&InstanceId>,
    ) -> Result<Vec<Versioned<BatchLock>>, StoreError>;
}
