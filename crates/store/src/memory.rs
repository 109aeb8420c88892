// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordination store
//!
//! Clones share one document, so several coordinators built on clones of
//! the same `MemoryStore` behave like instances sharing a database.

use crate::document::Document;
use crate::store::{CoordinationStore, Precondition, StoreError, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tandem_core::{BatchLock, Clock, Instance, InstanceId, InstanceStatus, SystemClock};

#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    fail_next: u32,
}

/// Store backed by a shared in-memory document
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    doc: Arc<Mutex<Document>>,
    clock: C,
    #[cfg(any(test, feature = "test-support"))]
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Store whose `server_time` reads from `clock`
    pub fn with_clock(clock: C) -> Self {
        Self {
            doc: Arc::new(Mutex::new(Document::default())),
            clock,
            #[cfg(any(test, feature = "test-support"))]
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> Document {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with_doc<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.check_faults()?;
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut doc)
    }

    #[cfg(any(test, feature = "test-support"))]
    fn check_faults(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        if faults.unavailable {
            return Err(StoreError::Unavailable("store marked unavailable".to_string()));
        }
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    #[cfg(not(any(test, feature = "test-support")))]
    fn check_faults(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl<C: Clock> MemoryStore<C> {
    /// Make every operation fail with [`StoreError::Unavailable`] until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unavailable = unavailable;
    }

    /// Fail the next `count` operations, then recover
    pub fn fail_next(&self, count: u32) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_next = count;
    }

    /// Write a lock directly, bypassing preconditions
    pub fn insert_lock(&self, lock: BatchLock) -> u64 {
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.put_lock(&lock, Precondition::Any).unwrap_or_default()
    }

    /// Write an instance directly, bypassing preconditions
    pub fn insert_instance(&self, instance: Instance) -> u64 {
        let mut doc = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        doc.put_instance(&instance, Precondition::Any)
            .unwrap_or_default()
    }
}

#[async_trait]
impl<C: Clock> CoordinationStore for MemoryStore<C> {
    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        self.check_faults()?;
        Ok(self.clock.utc_now())
    }

    async fn get_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<Versioned<Instance>>, StoreError> {
        self.with_doc(|doc| Ok(doc.get_instance(id)))
    }

    async fn put_instance(
        &self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        self.with_doc(|doc| doc.put_instance(instance, expected))
    }

    async fn scan_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Versioned<Instance>>, StoreError> {
        self.with_doc(|doc| Ok(doc.scan_instances(status)))
    }

    async fn get_lock(&self, batch_id: &str) -> Result<Option<Versioned<BatchLock>>, StoreError> {
        self.with_doc(|doc| Ok(doc.get_lock(batch_id)))
    }

    async fn put_lock(
        &self,
        lock: &BatchLock,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        self.with_doc(|doc| doc.put_lock(lock, expected))
    }

    async fn delete_lock(
        &self,
        batch_id: &str,
        expected: Precondition,
    ) -> Result<bool, StoreError> {
        self.with_doc(|doc| doc.delete_lock(batch_id, expected))
    }

    async fn scan_locks(
        &self,
        holder: Option<&InstanceId>,
    ) -> Result<Vec<Versioned<BatchLock>>, StoreError> {
        self.with_doc(|doc| Ok(doc.scan_locks(holder)))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
