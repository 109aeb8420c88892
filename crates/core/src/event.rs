// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination events
//!
//! Emitted by the coordinator and breakers for monitoring. Events describe
//! what already happened; nothing in the coordination path depends on anyone
//! receiving them.

use crate::batch_lock::TakeoverReason;
use crate::id::InstanceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // Instance events
    InstanceRegistered {
        instance_id: InstanceId,
        host_label: String,
    },
    InstanceStopped {
        instance_id: InstanceId,
    },
    InstanceReaped {
        instance_id: InstanceId,
        reaped_by: InstanceId,
        locks_released: usize,
    },
    /// A running instance found itself marked stopped by a peer
    InstanceRevived {
        instance_id: InstanceId,
    },

    // Lock events
    LockAcquired {
        batch_id: String,
        holder: InstanceId,
        operation: String,
    },
    LockTakeover {
        batch_id: String,
        previous_holder: InstanceId,
        new_holder: InstanceId,
        reason: TakeoverReason,
    },
    LockDenied {
        batch_id: String,
        requester: InstanceId,
        current_holder: InstanceId,
    },
    LockRefreshed {
        batch_id: String,
        holder: InstanceId,
    },
    LockReleased {
        batch_id: String,
        holder: InstanceId,
    },
    /// Release or refresh found the lock owned by someone else, or gone
    LockLost {
        batch_id: String,
        holder: InstanceId,
    },
    LockForceReleased {
        batch_id: String,
        holder: InstanceId,
        released_by: InstanceId,
    },

    // Breaker events
    BreakerOpened {
        name: String,
        failures: usize,
    },
    BreakerHalfOpen {
        name: String,
    },
    BreakerClosed {
        name: String,
    },
    BreakerReset {
        name: String,
    },
}

impl Event {
    /// Stable event name, e.g. `lock:takeover`
    pub fn name(&self) -> &'static str {
        match self {
            Event::InstanceRegistered { .. } => "instance:registered",
            Event::InstanceStopped { .. } => "instance:stopped",
            Event::InstanceReaped { .. } => "instance:reaped",
            Event::InstanceRevived { .. } => "instance:revived",

            Event::LockAcquired { .. } => "lock:acquired",
            Event::LockTakeover { .. } => "lock:takeover",
            Event::LockDenied { .. } => "lock:denied",
            Event::LockRefreshed { .. } => "lock:refreshed",
            Event::LockReleased { .. } => "lock:released",
            Event::LockLost { .. } => "lock:lost",
            Event::LockForceReleased { .. } => "lock:force_released",

            Event::BreakerOpened { .. } => "breaker:opened",
            Event::BreakerHalfOpen { .. } => "breaker:half_open",
            Event::BreakerClosed { .. } => "breaker:closed",
            Event::BreakerReset { .. } => "breaker:reset",
        }
    }

    /// Whether the event name matches `pattern`
    ///
    /// `*` matches everything; a trailing `:` or `*` matches by prefix.
    pub fn matches(&self, pattern: &str) -> bool {
        let name = self.name();
        if pattern == "*" {
            return true;
        }
        if pattern.ends_with(':') || pattern.ends_with('*') {
            let prefix = pattern.trim_end_matches('*');
            return name.starts_with(prefix);
        }
        name == pattern
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
