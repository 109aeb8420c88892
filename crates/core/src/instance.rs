// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance liveness records
//!
//! Each coordinator process owns exactly one [`Instance`] record and renews its
//! `last_heartbeat`. Peers decide liveness from that timestamp alone, at the
//! moment they need the answer.

use crate::id::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle status of a coordinator instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Stopping,
    Stopped,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Stopping => "stopping",
            InstanceStatus::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// A registered coordinator process
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: InstanceStatus,
    pub host_label: String,
    pub version: String,
}

impl Instance {
    /// A freshly started instance whose first heartbeat is `now`
    pub fn register(
        instance_id: InstanceId,
        host_label: impl Into<String>,
        version: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_id,
            started_at: now,
            last_heartbeat: now,
            status: InstanceStatus::Active,
            host_label: host_label.into(),
            version: version.into(),
        }
    }

    /// Time since the last heartbeat; zero if the heartbeat is in the future
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_heartbeat).to_std().unwrap_or(Duration::ZERO)
    }

    /// Alive iff `now - last_heartbeat < heartbeat_timeout`
    pub fn is_alive(&self, now: DateTime<Utc>, heartbeat_timeout: Duration) -> bool {
        self.heartbeat_age(now) < heartbeat_timeout
    }

    /// Return a copy with the heartbeat renewed at `now`
    pub fn heartbeat(&self, now: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: now,
            ..self.clone()
        }
    }

    /// Return a copy with a new status
    pub fn with_status(&self, status: InstanceStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
