// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch lock records and the claim decision
//!
//! A [`BatchLock`] exists only while some instance holds the batch. Whether a
//! new caller may write over an existing record is decided by the pure
//! [`BatchLock::claim`] function; the store's conditional write makes that
//! decision atomic.

use crate::clock::add_duration;
use crate::id::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An exclusive, leased hold on one batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLock {
    pub batch_id: String,
    pub holder_instance_id: InstanceId,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub operation_label: String,
}

/// Why an existing lock may be overwritten
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoverReason {
    /// The holder's lease ran out
    LeaseExpired,
    /// The holder stopped heartbeating
    HolderDead,
}

impl std::fmt::Display for TakeoverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TakeoverReason::LeaseExpired => write!(f, "lease expired"),
            TakeoverReason::HolderDead => write!(f, "holder dead"),
        }
    }
}

/// Outcome of evaluating a claim against the current record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim {
    /// No record exists; create one
    Fresh,
    /// A record exists but may be overwritten
    Takeover {
        previous: InstanceId,
        reason: TakeoverReason,
    },
    /// A live holder owns the batch
    Busy {
        holder: InstanceId,
        expires_at: DateTime<Utc>,
    },
}

impl Claim {
    pub fn is_busy(&self) -> bool {
        matches!(self, Claim::Busy { .. })
    }
}

impl BatchLock {
    pub fn new(
        batch_id: impl Into<String>,
        holder: InstanceId,
        operation_label: impl Into<String>,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            holder_instance_id: holder,
            acquired_at: now,
            expires_at: add_duration(now, lease),
            operation_label: operation_label.into(),
        }
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_held_by(&self, instance: &InstanceId) -> bool {
        &self.holder_instance_id == instance
    }

    /// Lease time left; zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Return a copy whose lease runs for `lease` from `now`
    pub fn renewed(&self, now: DateTime<Utc>, lease: Duration) -> Self {
        Self {
            expires_at: add_duration(now, lease),
            ..self.clone()
        }
    }

    /// Decide whether a caller may write a new lock over `current`.
    ///
    /// `holder_alive` is only consulted for unexpired records. The same
    /// instance re-acquiring its own live lock is `Busy`: two tasks in one
    /// process exclude each other the same way two processes do.
    pub fn claim(
        current: Option<&BatchLock>,
        now: DateTime<Utc>,
        holder_alive: impl FnOnce(&InstanceId) -> bool,
    ) -> Claim {
        let Some(current) = current else {
            return Claim::Fresh;
        };

        if current.is_expired(now) {
            return Claim::Takeover {
                previous: current.holder_instance_id.clone(),
                reason: TakeoverReason::LeaseExpired,
            };
        }

        if !holder_alive(&current.holder_instance_id) {
            return Claim::Takeover {
                previous: current.holder_instance_id.clone(),
                reason: TakeoverReason::HolderDead,
            };
        }

        Claim::Busy {
            holder: current.holder_instance_id.clone(),
            expires_at: current.expires_at,
        }
    }
}

#[cfg(test)]
#[path = "batch_lock_tests.rs"]
mod tests;
