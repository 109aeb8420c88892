// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic self-heartbeat

use crate::coordinator::{Coordinator, Inner};
use crate::error::CoordError;
use std::sync::Weak;
use std::time::Duration;
use tandem_core::{Event, Instance, InstanceStatus};
use tandem_store::{CoordinationStore, Precondition};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

impl<S: CoordinationStore> Coordinator<S> {
    /// Renew this instance's heartbeat once.
    ///
    /// Recreates a missing record, and re-marks the instance active if a
    /// peer's reaper marked it stopped while it was still running.
    pub async fn heartbeat(&self) -> Result<(), CoordError> {
        let store = &self.inner.store;
        let me = &self.inner.instance_id;
        let now = store.server_time().await?;

        let (record, expected) = match store.get_instance(me).await? {
            Some(current) => (current.record, Precondition::Version(current.version)),
            None => {
                tracing::warn!(instance = %me, "instance record missing, re-registering");
                let fresh = Instance::register(
                    me.clone(),
                    self.inner.host_label.clone(),
                    self.inner.version.clone(),
                    now,
                );
                (fresh, Precondition::Absent)
            }
        };

        let revived = record.status == InstanceStatus::Stopped;
        let mut next = record.heartbeat(now);
        if revived {
            next = next.with_status(InstanceStatus::Active);
        }
        store.put_instance(&next, expected).await?;

        if revived {
            tracing::warn!(instance = %me, "instance was marked stopped by a peer, reactivated");
            self.emit(Event::InstanceRevived {
                instance_id: me.clone(),
            });
        } else {
            tracing::trace!(instance = %me, "heartbeat");
        }
        Ok(())
    }
}

/// Heartbeat loop; exits on cancellation or once the coordinator is gone.
/// A failed beat is logged and retried on the next tick.
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
        if let Err(e) = coordinator.heartbeat().await {
            tracing::warn!(error = %e, "heartbeat failed");
        }
    }
    tracing::debug!("heartbeat stopped");
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
