// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch lock acquisition, refresh and release
//!
//! Each attempt reads the lock record, decides with [`BatchLock::claim`] and
//! writes conditionally on the version it read. Two instances racing on one
//! batch therefore get exactly one winner per attempt; the loser sees a
//! conflict and treats it as contention.

use crate::coordinator::Coordinator;
use crate::error::CoordError;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tandem_core::{BatchLock, Claim, Event, InstanceId};
use tandem_store::{CoordinationStore, Precondition, StoreError, Versioned};
use tokio::time::Instant;

/// Bound on re-reads when our own conditional write keeps losing to a
/// concurrent write on the same record
const MAX_CAS_ROUNDS: usize = 8;

/// Outcome of a single acquisition attempt
enum Attempt<S: CoordinationStore> {
    Acquired(LockGuard<S>),
    Busy(Option<InstanceId>),
    /// Won the write after `stop` began; the lock was given back
    Stopped,
}

impl<S: CoordinationStore> Coordinator<S> {
    /// Acquire a batch lock, waiting up to the configured default budget
    pub async fn acquire(
        &self,
        batch_id: &str,
        operation_label: &str,
    ) -> Result<LockGuard<S>, CoordError> {
        let max_wait = self.inner.config.default_max_wait();
        self.acquire_lock(batch_id, operation_label, max_wait).await
    }

    /// Acquire a batch lock, retrying contention with a fixed delay.
    ///
    /// Gives up with [`CoordError::LockBusy`] once `max_wait` has elapsed or
    /// `max_lock_retries` retries are spent. Store errors are retried on the
    /// same schedule and returned if the final attempt failed with one. No
    /// ordering among waiters is promised. A waiter still retrying when
    /// [`Coordinator::stop`] runs gets [`CoordError::NotStarted`].
    pub async fn acquire_lock(
        &self,
        batch_id: &str,
        operation_label: &str,
        max_wait: Duration,
    ) -> Result<LockGuard<S>, CoordError> {
        let started = Instant::now();
        // Too large to represent means no deadline; retries still bound the wait
        let deadline = started.checked_add(max_wait);
        let retry_delay = self.inner.config.lock_retry_delay;
        let max_retries = self.inner.config.max_lock_retries;

        let mut retries = 0u32;
        let mut last_holder = None;
        loop {
            if !self.is_started() {
                return Err(CoordError::NotStarted);
            }
            let failure = match self.try_acquire(batch_id, operation_label).await {
                Ok(Attempt::Acquired(guard)) => return Ok(guard),
                Ok(Attempt::Stopped) => return Err(CoordError::NotStarted),
                Ok(Attempt::Busy(holder)) => {
                    if holder.is_some() {
                        last_holder = holder;
                    }
                    None
                }
                Err(e) => {
                    tracing::warn!(batch_id, error = %e, "lock attempt failed");
                    Some(e)
                }
            };

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) || retries >= max_retries {
                if let Some(e) = failure {
                    return Err(e.into());
                }
                tracing::info!(
                    batch_id,
                    holder = ?last_holder.as_ref().map(|h| h.as_str()),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "gave up waiting for lock"
                );
                return Err(CoordError::LockBusy {
                    batch_id: batch_id.to_string(),
                    holder: last_holder,
                    waited: started.elapsed(),
                });
            }

            retries += 1;
            let delay = match deadline {
                Some(d) => retry_delay.min(d - now),
                None => retry_delay,
            };
            tokio::time::sleep(delay).await;
        }
    }

    async fn try_acquire(
        &self,
        batch_id: &str,
        operation_label: &str,
    ) -> Result<Attempt<S>, StoreError> {
        let store = &self.inner.store;
        let me = &self.inner.instance_id;

        let now = store.server_time().await?;
        let current = store.get_lock(batch_id).await?;

        // Only an unexpired record needs the holder's liveness
        let holder_alive = match &current {
            Some(v) if !v.record.is_expired(now) => {
                self.instance_alive_at(&v.record.holder_instance_id, now)
                    .await?
            }
            _ => true,
        };
        let claim =
            BatchLock::claim(current.as_ref().map(|v| &v.record), now, |_| holder_alive);

        if let Claim::Busy { holder, expires_at } = &claim {
            tracing::debug!(batch_id, %holder, %expires_at, "lock busy");
            self.emit(Event::LockDenied {
                batch_id: batch_id.to_string(),
                requester: me.clone(),
                current_holder: holder.clone(),
            });
            return Ok(Attempt::Busy(Some(holder.clone())));
        }

        let expected = match &current {
            None => Precondition::Absent,
            Some(v) => Precondition::Version(v.version),
        };
        let lock = BatchLock::new(
            batch_id,
            me.clone(),
            operation_label,
            now,
            self.inner.config.lock_lease,
        );
        match store.put_lock(&lock, expected).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                tracing::debug!(batch_id, "lost acquisition race");
                return Ok(Attempt::Busy(current.map(|v| v.record.holder_instance_id)));
            }
            Err(e) => return Err(e),
        }

        self.remember(batch_id, lock.acquired_at);
        // `stop` clears the started flag before it collects held locks, so
        // either it sees this entry or we see the flag
        if !self.is_started() {
            tracing::info!(batch_id, "coordinator stopping; returning lock just acquired");
            if let Err(e) = self.release_owned(batch_id, lock.acquired_at).await {
                tracing::warn!(batch_id, error = %e, "failed to return lock acquired during stop");
                self.forget(batch_id, lock.acquired_at);
            }
            return Ok(Attempt::Stopped);
        }

        match claim {
            Claim::Takeover { previous, reason } => {
                tracing::warn!(
                    batch_id,
                    previous = %previous,
                    %reason,
                    operation = operation_label,
                    "lock taken over"
                );
                self.emit(Event::LockTakeover {
                    batch_id: batch_id.to_string(),
                    previous_holder: previous,
                    new_holder: me.clone(),
                    reason,
                });
            }
            _ => {
                tracing::info!(batch_id, operation = operation_label, "lock acquired");
                self.emit(Event::LockAcquired {
                    batch_id: batch_id.to_string(),
                    holder: me.clone(),
                    operation: operation_label.to_string(),
                });
            }
        }

        Ok(Attempt::Acquired(LockGuard {
            coordinator: self.clone(),
            batch_id: batch_id.to_string(),
            acquired_at: lock.acquired_at,
            expires_at: lock.expires_at,
            released: false,
        }))
    }

    /// Extend the lease of a lock this process holds.
    ///
    /// Returns `false` when the lock was taken over, deleted, or was never
    /// held here. Store failures are errors.
    pub async fn refresh_lock(&self, batch_id: &str) -> Result<bool, CoordError> {
        let Some(acquired_at) = self.held_since(batch_id) else {
            return Ok(false);
        };
        Ok(self.refresh_owned(batch_id, acquired_at).await?.is_some())
    }

    /// Release a lock this process holds; `false` if it no longer owned it
    pub async fn release_lock(&self, batch_id: &str) -> Result<bool, CoordError> {
        let Some(acquired_at) = self.held_since(batch_id) else {
            return Ok(false);
        };
        self.release_owned(batch_id, acquired_at).await
    }

    /// Run `work` while holding the batch lock, then release it.
    ///
    /// A failed release is logged rather than returned since the work has
    /// already completed; the lease expires on its own.
    pub async fn with_lock<F, Fut, T>(
        &self,
        batch_id: &str,
        operation_label: &str,
        max_wait: Duration,
        work: F,
    ) -> Result<T, CoordError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire_lock(batch_id, operation_label, max_wait).await?;
        let output = work().await;
        if let Err(e) = guard.release().await {
            tracing::warn!(batch_id, error = %e, "release after locked work failed");
        }
        Ok(output)
    }

    /// Whether the stored lock for `batch_id` is live and held by this instance
    pub async fn is_lock_held_by_me(&self, batch_id: &str) -> Result<bool, CoordError> {
        let now = self.inner.store.server_time().await?;
        let held = self
            .inner
            .store
            .get_lock(batch_id)
            .await?
            .is_some_and(|v| !v.record.is_expired(now) && v.record.is_held_by(&self.inner.instance_id));
        Ok(held)
    }

    /// Holder of the unexpired lock on `batch_id`, if any
    pub async fn get_lock_holder(&self, batch_id: &str) -> Result<Option<InstanceId>, CoordError> {
        let now = self.inner.store.server_time().await?;
        let holder = self
            .inner
            .store
            .get_lock(batch_id)
            .await?
            .filter(|v| !v.record.is_expired(now))
            .map(|v| v.record.holder_instance_id);
        Ok(holder)
    }

    /// Delete a lock whoever holds it. Operator override; audited.
    pub async fn force_release(&self, batch_id: &str) -> Result<Option<BatchLock>, CoordError> {
        for _ in 0..MAX_CAS_ROUNDS {
            let Some(current) = self.inner.store.get_lock(batch_id).await? else {
                return Ok(None);
            };
            match self.force_release_if(current).await {
                Err(CoordError::Store(e)) if e.is_conflict() => continue,
                other => return other,
            }
        }
        Err(contention(batch_id))
    }

    /// Delete a lock only if it is still the exact record the caller checked.
    ///
    /// Returns `None` when the lock is already gone. A lock rewritten since
    /// `checked` was read (refreshed or taken over) is left alone and
    /// reported as a store conflict. Audited like [`Self::force_release`].
    pub async fn force_release_if(
        &self,
        checked: Versioned<BatchLock>,
    ) -> Result<Option<BatchLock>, CoordError> {
        let batch_id = checked.record.batch_id.as_str();
        let deleted = self
            .inner
            .store
            .delete_lock(batch_id, Precondition::Version(checked.version))
            .await?;
        if !deleted {
            return Ok(None);
        }

        let holder = checked.record.holder_instance_id.clone();
        tracing::warn!(
            target: "audit",
            batch_id,
            holder = %holder,
            released_by = %self.inner.instance_id,
            "lock force-released"
        );
        self.emit(Event::LockForceReleased {
            batch_id: batch_id.to_string(),
            holder,
            released_by: self.inner.instance_id.clone(),
        });
        Ok(Some(checked.record))
    }

    /// Renew the lease if the record still belongs to this acquisition.
    /// Returns the new expiry, or `None` when ownership is gone.
    pub(crate) async fn refresh_owned(
        &self,
        batch_id: &str,
        acquired_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoordError> {
        let store = &self.inner.store;
        for _ in 0..MAX_CAS_ROUNDS {
            let now = store.server_time().await?;
            let current = match store.get_lock(batch_id).await? {
                Some(v) if self.owns(&v.record, acquired_at) => v,
                _ => {
                    self.lost(batch_id, acquired_at, "lock ownership lost before refresh");
                    return Ok(None);
                }
            };

            let renewed = current.record.renewed(now, self.inner.config.lock_lease);
            match store
                .put_lock(&renewed, Precondition::Version(current.version))
                .await
            {
                Ok(_) => {
                    tracing::debug!(batch_id, expires_at = %renewed.expires_at, "lock refreshed");
                    self.emit(Event::LockRefreshed {
                        batch_id: batch_id.to_string(),
                        holder: self.inner.instance_id.clone(),
                    });
                    return Ok(Some(renewed.expires_at));
                }
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(contention(batch_id))
    }

    /// Delete the record if it still belongs to this acquisition
    pub(crate) async fn release_owned(
        &self,
        batch_id: &str,
        acquired_at: DateTime<Utc>,
    ) -> Result<bool, CoordError> {
        let store = &self.inner.store;
        for _ in 0..MAX_CAS_ROUNDS {
            let current = match store.get_lock(batch_id).await? {
                Some(v) if self.owns(&v.record, acquired_at) => v,
                _ => {
                    self.lost(batch_id, acquired_at, "lock ownership lost before release");
                    return Ok(false);
                }
            };

            match store
                .delete_lock(batch_id, Precondition::Version(current.version))
                .await
            {
                Ok(_) => {
                    self.forget(batch_id, acquired_at);
                    tracing::info!(batch_id, "lock released");
                    self.emit(Event::LockReleased {
                        batch_id: batch_id.to_string(),
                        holder: self.inner.instance_id.clone(),
                    });
                    return Ok(true);
                }
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(contention(batch_id))
    }

    fn owns(&self, lock: &BatchLock, acquired_at: DateTime<Utc>) -> bool {
        lock.is_held_by(&self.inner.instance_id) && lock.acquired_at == acquired_at
    }

    fn lost(&self, batch_id: &str, acquired_at: DateTime<Utc>, message: &'static str) {
        let was_held = self.held_since(batch_id) == Some(acquired_at);
        self.forget(batch_id, acquired_at);
        if was_held {
            tracing::warn!(batch_id, "{}", message);
            self.emit(Event::LockLost {
                batch_id: batch_id.to_string(),
                holder: self.inner.instance_id.clone(),
            });
        }
    }
}

fn contention(batch_id: &str) -> CoordError {
    CoordError::Store(StoreError::Conflict {
        collection: "batch_locks",
        key: batch_id.to_string(),
    })
}

/// Exclusive hold on one batch.
///
/// Dropping an unreleased guard schedules the release on the current tokio
/// runtime, so the lock is freed on every exit path including panics.
/// [`Coordinator::stop`] waits for those scheduled releases.
pub struct LockGuard<S: CoordinationStore> {
    coordinator: Coordinator<S>,
    batch_id: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    released: bool,
}

impl<S: CoordinationStore> std::fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("batch_id", &self.batch_id)
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl<S: CoordinationStore> LockGuard<S> {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Lease expiry as of the last acquire or refresh
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Extend the lease; `false` once ownership has been lost
    pub async fn refresh(&mut self) -> Result<bool, CoordError> {
        match self
            .coordinator
            .refresh_owned(&self.batch_id, self.acquired_at)
            .await?
        {
            Some(expires_at) => {
                self.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Refresh, turning lost ownership into [`CoordError::OwnershipLost`]
    pub async fn ensure_held(&mut self) -> Result<(), CoordError> {
        if self.refresh().await? {
            Ok(())
        } else {
            Err(CoordError::OwnershipLost {
                batch_id: self.batch_id.clone(),
            })
        }
    }

    /// Release now; `false` if the lock had already been lost
    pub async fn release(mut self) -> Result<bool, CoordError> {
        self.released = true;
        self.coordinator
            .release_owned(&self.batch_id, self.acquired_at)
            .await
    }
}

impl<S: CoordinationStore> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let coordinator = self.coordinator.clone();
        let batch_id = std::mem::take(&mut self.batch_id);
        let acquired_at = self.acquired_at;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%batch_id, "lock guard dropped outside a runtime; lease will expire");
            coordinator.forget(&batch_id, acquired_at);
            return;
        };
        let releases = coordinator.inner.releases.clone();
        handle.spawn(releases.track_future(async move {
            if let Err(e) = coordinator.release_owned(&batch_id, acquired_at).await {
                tracing::warn!(%batch_id, error = %e, "release of dropped guard failed");
            }
        }));
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
