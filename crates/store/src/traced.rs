// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced store wrapper for consistent observability

use crate::store::{CoordinationStore, Precondition, StoreError, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tandem_core::{BatchLock, Instance, InstanceId, InstanceStatus};
use tracing::Instrument;

/// Wrapper that adds tracing to any CoordinationStore
#[derive(Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Lost conditional writes are routine under contention; everything else is not
fn log_outcome<T>(result: &Result<T, StoreError>, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::trace!(elapsed_ms, "ok"),
        Err(e) if e.is_conflict() => tracing::debug!(elapsed_ms, error = %e, "conflict"),
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "store call failed"),
    }
}

#[async_trait]
impl<S: CoordinationStore> CoordinationStore for TracedStore<S> {
    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let result = self.inner.server_time().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "server_time failed");
        }
        result
    }

    async fn get_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<Versioned<Instance>>, StoreError> {
        let span = tracing::debug_span!("store.get_instance", instance = %id);
        async {
            let started = Instant::now();
            let result = self.inner.get_instance(id).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn put_instance(
        &self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        let span = tracing::info_span!(
            "store.put_instance",
            instance = %instance.instance_id,
            status = %instance.status,
            ?expected
        );
        async {
            let started = Instant::now();
            let result = self.inner.put_instance(instance, expected).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn scan_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Versioned<Instance>>, StoreError> {
        let span = tracing::debug_span!("store.scan_instances", ?status);
        async {
            let started = Instant::now();
            let result = self.inner.scan_instances(status).await;
            tracing::trace!(count = result.as_ref().map(|v| v.len()).ok(), "scanned");
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn get_lock(&self, batch_id: &str) -> Result<Option<Versioned<BatchLock>>, StoreError> {
        let span = tracing::debug_span!("store.get_lock", batch_id);
        async {
            let started = Instant::now();
            let result = self.inner.get_lock(batch_id).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn put_lock(
        &self,
        lock: &BatchLock,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        let span = tracing::info_span!(
            "store.put_lock",
            batch_id = %lock.batch_id,
            holder = %lock.holder_instance_id,
            ?expected
        );
        async {
            let started = Instant::now();
            let result = self.inner.put_lock(lock, expected).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_lock(
        &self,
        batch_id: &str,
        expected: Precondition,
    ) -> Result<bool, StoreError> {
        let span = tracing::info_span!("store.delete_lock", batch_id, ?expected);
        async {
            let started = Instant::now();
            let result = self.inner.delete_lock(batch_id, expected).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn scan_locks(
        &self,
        holder: Option<&InstanceId>,
    ) -> Result<Vec<Versioned<BatchLock>>, StoreError> {
        let span = tracing::debug_span!("store.scan_locks", holder = ?holder.map(|h| h.as_str()));
        async {
            let started = Instant::now();
            let result = self.inner.scan_locks(holder).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
