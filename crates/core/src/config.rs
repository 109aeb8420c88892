// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for coordination, circuit breaking and the store
//!
//! Loaded from TOML. Durations are humantime strings:
//!
//! ```toml
//! [coordination]
//! heartbeat_interval = "30s"
//! heartbeat_timeout = "90s"
//! lock_lease = "5m"
//!
//! [breaker]
//! max_failures = 5
//! failure_threshold_window = "60s"
//!
//! [store]
//! kind = "file"
//! path = "/var/lib/tandem/state.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Heartbeat, lease and reaper settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinationConfig {
    /// How often an instance renews its heartbeat
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Heartbeat age at which peers consider an instance dead
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,
    /// Lease granted by each acquire or refresh
    #[serde(with = "humantime_serde")]
    pub lock_lease: Duration,
    /// Delay between contended acquire attempts
    #[serde(with = "humantime_serde")]
    pub lock_retry_delay: Duration,
    /// Retries after the first attempt before giving up
    pub max_lock_retries: u32,
    /// Run the dead-instance reaper alongside the heartbeat
    #[serde(with = "humantime_serde")]
    pub reap_interval: Option<Duration>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            lock_lease: Duration::from_secs(300),
            lock_retry_delay: Duration::from_secs(5),
            max_lock_retries: 60,
            reap_interval: None,
        }
    }
}

impl CoordinationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = lease;
        self
    }

    pub fn with_lock_retry_delay(mut self, delay: Duration) -> Self {
        self.lock_retry_delay = delay;
        self
    }

    pub fn with_max_lock_retries(mut self, retries: u32) -> Self {
        self.max_lock_retries = retries;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = Some(interval);
        self
    }

    /// Wait budget used when the caller does not pass one
    pub fn default_max_wait(&self) -> Duration {
        self.lock_retry_delay.saturating_mul(self.max_lock_retries)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        if self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(ConfigError::Invalid(format!(
                "heartbeat_timeout ({:?}) must exceed heartbeat_interval ({:?})",
                self.heartbeat_timeout, self.heartbeat_interval
            )));
        }
        if self.lock_lease.is_zero() {
            return Err(ConfigError::Invalid("lock_lease must be positive".to_string()));
        }
        if self.reap_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Invalid(
                "reap_interval must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Circuit breaker thresholds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Failures inside the window that open the circuit
    pub max_failures: u32,
    /// How long the circuit stays open before probing
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Consecutive half-open successes needed to close
    pub half_open_attempts: u32,
    /// Sliding window for counting failures
    #[serde(with = "humantime_serde")]
    pub failure_threshold_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(300),
            half_open_attempts: 3,
            failure_threshold_window: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_half_open_attempts(mut self, attempts: u32) -> Self {
        self.half_open_attempts = attempts;
        self
    }

    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_threshold_window = window;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failures == 0 {
            return Err(ConfigError::Invalid("max_failures must be at least 1".to_string()));
        }
        if self.half_open_attempts == 0 {
            return Err(ConfigError::Invalid(
                "half_open_attempts must be at least 1".to_string(),
            ));
        }
        if self.failure_threshold_window.is_zero() {
            return Err(ConfigError::Invalid(
                "failure_threshold_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which coordination store backs the instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StoreConfig {
    /// Process-local store, only useful for tests and single-process runs
    Memory,
    /// JSON document on a filesystem shared by all instances
    File { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: PathBuf::from("tandem-state.json"),
        }
    }
}

/// Top-level configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TandemConfig {
    pub coordination: CoordinationConfig,
    pub breaker: BreakerConfig,
    pub store: StoreConfig,
}

impl TandemConfig {
    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TandemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordination.validate()?;
        self.breaker.validate()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
