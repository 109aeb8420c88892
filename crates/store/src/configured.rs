// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store selected at runtime from [`StoreConfig`]

use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::store::{CoordinationStore, Precondition, StoreError, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tandem_core::{BatchLock, Instance, InstanceId, InstanceStatus, StoreConfig};

/// Either backend, so binaries can pick one from configuration
#[derive(Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    File(FileStore),
}

impl AnyStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match config {
            StoreConfig::Memory => Ok(AnyStore::Memory(MemoryStore::new())),
            StoreConfig::File { path } => Ok(AnyStore::File(FileStore::open(path.clone())?)),
        }
    }

    /// Short backend name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnyStore::Memory(_) => "memory",
            AnyStore::File(_) => "file",
        }
    }
}

#[async_trait]
impl CoordinationStore for AnyStore {
    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.server_time().await,
            AnyStore::File(s) => s.server_time().await,
        }
    }

    async fn get_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<Versioned<Instance>>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.get_instance(id).await,
            AnyStore::File(s) => s.get_instance(id).await,
        }
    }

    async fn put_instance(
        &self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        match self {
            AnyStore::Memory(s) => s.put_instance(instance, expected).await,
            AnyStore::File(s) => s.put_instance(instance, expected).await,
        }
    }

    async fn scan_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Versioned<Instance>>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.scan_instances(status).await,
            AnyStore::File(s) => s.scan_instances(status).await,
        }
    }

    async fn get_lock(&self, batch_id: &str) -> Result<Option<Versioned<BatchLock>>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.get_lock(batch_id).await,
            AnyStore::File(s) => s.get_lock(batch_id).await,
        }
    }

    async fn put_lock(
        &self,
        lock: &BatchLock,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        match self {
            AnyStore::Memory(s) => s.put_lock(lock, expected).await,
            AnyStore::File(s) => s.put_lock(lock, expected).await,
        }
    }

    async fn delete_lock(
        &self,
        batch_id: &str,
        expected: Precondition,
    ) -> Result<bool, StoreError> {
        match self {
            AnyStore::Memory(s) => s.delete_lock(batch_id, expected).await,
            AnyStore::File(s) => s.delete_lock(batch_id, expected).await,
        }
    }

    async fn scan_locks(
        &self,
        holder: Option<&InstanceId>,
    ) -> Result<Vec<Versioned<BatchLock>>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.scan_locks(holder).await,
            AnyStore::File(s) => s.scan_locks(holder).await,
        }
    }
}

#[cfg(test)]
#[path = "configured_tests.rs"]
mod tests;
