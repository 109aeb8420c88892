// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tandem_core::{BatchLock, Instance};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a table with a header line, or a JSON array
pub fn print_table<T: Serialize + fmt::Display>(
    header: &str,
    empty: &str,
    items: &[T],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{}", empty);
                return;
            }
            println!("{}", header);
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

pub const INSTANCE_HEADER: &str = "INSTANCE             STATUS    ALIVE  HEARTBEAT  HOST";

/// One row of `tandem instances`
#[derive(Debug, Serialize)]
pub struct InstanceRow {
    pub instance_id: String,
    pub status: String,
    pub alive: bool,
    pub heartbeat_age_secs: i64,
    pub host_label: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl InstanceRow {
    pub fn new(instance: &Instance, now: DateTime<Utc>, timeout: Duration) -> Self {
        Self {
            instance_id: instance.instance_id.to_string(),
            status: instance.status.to_string(),
            alive: instance.is_alive(now, timeout),
            heartbeat_age_secs: (now - instance.last_heartbeat).num_seconds(),
            host_label: instance.host_label.clone(),
            version: instance.version.clone(),
            started_at: instance.started_at,
        }
    }
}

impl fmt::Display for InstanceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<9} {:<6} {:<10} {}",
            truncate(&self.instance_id, 20),
            self.status,
            if self.alive { "yes" } else { "no" },
            format!("{}s", self.heartbeat_age_secs),
            self.host_label
        )
    }
}

pub const LOCK_HEADER: &str = "BATCH                HOLDER               OPERATION        EXPIRES  STATE";

/// One row of `tandem locks`
#[derive(Debug, Serialize)]
pub struct LockRow {
    pub batch_id: String,
    pub holder: String,
    pub operation: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_in_secs: i64,
    /// `held`, `expired` or `orphaned` (holder dead, lease not yet expired)
    pub state: &'static str,
}

impl LockRow {
    pub fn new(lock: &BatchLock, now: DateTime<Utc>, holder_alive: bool) -> Self {
        let state = if lock.is_expired(now) {
            "expired"
        } else if holder_alive {
            "held"
        } else {
            "orphaned"
        };
        Self {
            batch_id: lock.batch_id.clone(),
            holder: lock.holder_instance_id.to_string(),
            operation: lock.operation_label.clone(),
            acquired_at: lock.acquired_at,
            expires_in_secs: (lock.expires_at - now).num_seconds(),
            state,
        }
    }
}

impl fmt::Display for LockRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<20} {:<16} {:<8} {}",
            truncate(&self.batch_id, 20),
            truncate(&self.holder, 20),
            truncate(&self.operation, 16),
            format!("{}s", self.expires_in_secs),
            self.state
        )
    }
}

/// Result of `tandem holder`
#[derive(Debug, Serialize)]
pub struct HolderView {
    pub batch_id: String,
    pub holder: Option<String>,
}

impl fmt::Display for HolderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.holder {
            Some(holder) => write!(f, "{}", holder),
            None => write!(f, "none"),
        }
    }
}

/// Result of `tandem reap`
#[derive(Debug, Serialize)]
pub struct ReapView {
    pub reaped: usize,
}

impl fmt::Display for ReapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reaped {} dead instance(s)", self.reaped)
    }
}

/// Result of `tandem release`
#[derive(Debug, Serialize)]
pub struct ReleaseView {
    pub batch_id: String,
    /// Holder of the deleted lock; `None` when there was no lock
    pub released_from: Option<String>,
}

impl fmt::Display for ReleaseView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.released_from {
            Some(holder) => write!(f, "Released {} (held by {})", self.batch_id, holder),
            None => write!(f, "No lock on {}", self.batch_id),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
