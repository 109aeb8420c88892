// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, maintenance, shutdown.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use sha2::{Digest, Sha256};
use tandem_breaker::{BreakerError, BreakerRegistry, BreakerSnapshot, BreakerState};
use tandem_coord::{CoordError, Coordinator};
use tandem_core::{ConfigError, Event, TandemConfig};
use tandem_store::{AnyStore, StoreError, TracedStore};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Store type used by the daemon (wrapped with tracing)
pub type DaemonStore = TracedStore<AnyStore>;

/// Breaker guarding the daemon's own store reads
pub const STORE_BREAKER: &str = "coordination_store";

/// File name stem when no instance id is given
const DEFAULT_NAME: &str = "tandemd";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the TOML configuration file
    pub config_path: PathBuf,
    /// Fixed instance id; a fresh UUID is used when absent
    pub instance_id: Option<String>,
    /// Directory holding the pid and log files for this config
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Config for a TOML file, with state under the user's state directory
    pub fn for_config_file(
        config_path: &Path,
        instance_id: Option<String>,
    ) -> Result<Self, LifecycleError> {
        Self::with_state_root(config_path, instance_id, &state_root()?)
    }

    /// Config with state under `root` instead of the user's state directory
    pub fn with_state_root(
        config_path: &Path,
        instance_id: Option<String>,
        root: &Path,
    ) -> Result<Self, LifecycleError> {
        let canonical = config_path
            .canonicalize()
            .map_err(|e| LifecycleError::ConfigNotFound(config_path.to_path_buf(), e))?;

        let state_dir = root.join("daemons").join(config_hash(&canonical));
        let name = instance_id.as_deref().unwrap_or(DEFAULT_NAME);

        Ok(Self {
            lock_path: state_dir.join(format!("{}.pid", name)),
            log_path: state_dir.join(format!("{}.log", name)),
            config_path: canonical,
            instance_id,
            state_dir,
        })
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    /// Parsed configuration file
    pub settings: TandemConfig,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// This process's coordinator, started
    pub coordinator: Coordinator<DaemonStore>,
    /// Breakers for dependencies the daemon calls
    pub breakers: BreakerRegistry,
    /// Coordination events, subscribed before start
    pub events: broadcast::Receiver<Event>,
    /// False once the event channel has closed
    pub events_open: bool,
    /// Count of events seen per name
    pub event_counts: BTreeMap<&'static str, u64>,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Record one event from the coordinator
    pub fn record_event(&mut self, event: &Event) {
        *self.event_counts.entry(event.name()).or_insert(0) += 1;
        debug!(event = event.name(), "coordination event");
    }

    /// Handle a receive error from the event channel
    pub fn events_failed(&mut self, error: broadcast::error::RecvError) {
        match error {
            broadcast::error::RecvError::Lagged(skipped) => {
                warn!(skipped, "event receiver lagged, events dropped");
            }
            broadcast::error::RecvError::Closed => {
                warn!("event channel closed");
                self.events_open = false;
            }
        }
    }

    /// Read the set of live peers through the store breaker.
    ///
    /// Returns the number of active instances, or `None` when the read
    /// failed or the breaker is open.
    pub async fn check_peers(&self) -> Option<usize> {
        let coordinator = &self.coordinator;
        match self
            .breakers
            .call(STORE_BREAKER, || coordinator.get_active_instances())
            .await
        {
            Ok(instances) => {
                debug!(active = instances.len(), "peer check");
                Some(instances.len())
            }
            Err(BreakerError::Open { retry_in, .. }) => {
                debug!(retry_in_secs = retry_in.as_secs(), "peer check skipped, store breaker open");
                None
            }
            Err(BreakerError::Inner(e)) => {
                warn!(error = %e, "peer check failed");
                None
            }
        }
    }

    /// Log every breaker's state; open and half-open ones at info
    pub fn report_breakers(&self) -> Vec<BreakerSnapshot> {
        let states = self.breakers.states();
        for snapshot in &states {
            if snapshot.state == BreakerState::Closed {
                debug!(breaker = %snapshot.name, failures = snapshot.failure_count, "breaker closed");
            } else {
                info!(
                    breaker = %snapshot.name,
                    state = %snapshot.state,
                    failures = snapshot.failure_count,
                    since_secs = snapshot.since_state_change.as_secs(),
                    "breaker not closed"
                );
            }
        }
        states
    }

    /// Operator request (SIGUSR1): close every breaker. Returns how many were tripped.
    pub fn reset_breakers(&self) -> usize {
        self.breakers.reset_all()
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Release held locks and mark the instance stopped
        let stopped = self.coordinator.stop().await;

        // 2. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 3. Lock file is released automatically when self.lock_file is dropped

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            events = ?self.event_counts,
            "Daemon shutdown complete"
        );
        stopped.map_err(LifecycleError::from)
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config not found at {0}: {1}")]
    ConfigNotFound(PathBuf, std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Coordination error: {0}")]
    Coord(#[from] CoordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // The pid file belongs to the daemon that holds the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents two daemons with one identity
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Load configuration BEFORE touching the store (fail fast)
    let settings = TandemConfig::load(&config.config_path)?;

    // 4. Open the store (wrapped with tracing for observability)
    let backend = AnyStore::open(&settings.store)?;
    info!(store = backend.kind(), "store opened");
    let store = TracedStore::new(backend);

    // 5. Build the coordinator and subscribe before it emits anything
    let mut builder = Coordinator::builder(store)
        .config(settings.coordination.clone())
        .version(env!("CARGO_PKG_VERSION"));
    if let Some(id) = &config.instance_id {
        builder = builder.instance_id(id.clone());
    }
    let coordinator = builder.build()?;
    let events = coordinator.subscribe();

    // 6. Breakers for the daemon's own dependencies
    let breakers = BreakerRegistry::new(settings.breaker.clone())?;

    // 7. Register and start heartbeating (LAST - only after all validation passes)
    coordinator.start().await?;

    info!(
        instance = %coordinator.instance_id(),
        config = %config.config_path.display(),
        reaper = settings.coordination.reap_interval.is_some(),
        "Daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        settings,
        lock_file,
        coordinator,
        breakers,
        events,
        events_open: true,
        event_counts: BTreeMap::new(),
        start_time: Instant::now(),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for tandem
fn state_root() -> Result<PathBuf, LifecycleError> {
    // TANDEM_STATE_DIR wins, then XDG_STATE_HOME, then ~/.local/state
    if let Ok(dir) = std::env::var("TANDEM_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("tandem"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/tandem"))
}

/// Hash of the config path, so daemons for different configs keep apart
fn config_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 hex chars
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
