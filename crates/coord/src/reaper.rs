// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-instance reaper
//!
//! Any instance may sweep. Marking a dead instance stopped is a conditional
//! write on the version that was judged stale, so an instance that
//! heartbeats in the meantime is left alone and two concurrent reapers
//! never both claim the same instance.

use crate::coordinator::{Coordinator, Inner};
use crate::error::CoordError;
use std::sync::Weak;
use std::time::Duration;
use tandem_core::{Event, InstanceId, InstanceStatus};
use tandem_store::{CoordinationStore, Precondition};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

impl<S: CoordinationStore> Coordinator<S> {
    /// Mark every stale instance stopped and delete the locks it holds.
    ///
    /// Returns the number of instances reaped by this call. This instance is
    /// never reaped by itself.
    pub async fn cleanup_dead_instances(&self) -> Result<usize, CoordError> {
        let store = &self.inner.store;
        let now = store.server_time().await?;
        let timeout = self.inner.config.heartbeat_timeout;

        let mut reaped = 0;
        for candidate in store.scan_instances(None).await? {
            let instance = &candidate.record;
            if instance.instance_id == self.inner.instance_id
                || instance.status == InstanceStatus::Stopped
                || instance.is_alive(now, timeout)
            {
                continue;
            }

            let stopped = instance.with_status(InstanceStatus::Stopped);
            match store
                .put_instance(&stopped, Precondition::Version(candidate.version))
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    tracing::debug!(instance = %instance.instance_id, "instance changed during reap, skipped");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let released = self.release_locks_of(&instance.instance_id).await?;
            tracing::info!(
                instance = %instance.instance_id,
                last_heartbeat = %instance.last_heartbeat,
                locks_released = released,
                "dead instance reaped"
            );
            self.emit(Event::InstanceReaped {
                instance_id: instance.instance_id.clone(),
                reaped_by: self.inner.instance_id.clone(),
                locks_released: released,
            });
            reaped += 1;
        }
        Ok(reaped)
    }

    /// Delete every lock still held by `holder`; locks taken over meanwhile are kept
    async fn release_locks_of(&self, holder: &InstanceId) -> Result<usize, CoordError> {
        let store = &self.inner.store;
        let mut released = 0;
        for lock in store.scan_locks(Some(holder)).await? {
            match store
                .delete_lock(&lock.record.batch_id, Precondition::Version(lock.version))
                .await
            {
                Ok(true) => {
                    released += 1;
                    tracing::info!(
                        batch_id = %lock.record.batch_id,
                        holder = %holder,
                        "released lock of dead instance"
                    );
                    self.emit(Event::LockForceReleased {
                        batch_id: lock.record.batch_id.clone(),
                        holder: holder.clone(),
                        released_by: self.inner.instance_id.clone(),
                    });
                }
                Ok(false) => {}
                Err(e) if e.is_conflict() => {
                    tracing::debug!(batch_id = %lock.record.batch_id, "lock changed during reap, kept");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(released)
    }
}

/// Reaper loop; errors are logged and the sweep retried on the next tick
pub(crate) async fn run<S: CoordinationStore>(
    inner: Weak<Inner<S>>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = Coordinator { inner };
        match coordinator.cleanup_dead_instances().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "reaper sweep finished"),
            Err(e) => tracing::warn!(error = %e, "reaper sweep failed"),
        }
    }
    tracing::debug!("reaper stopped");
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
