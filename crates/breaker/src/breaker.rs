// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-dependency circuit breaker
//!
//! ```text
//! Closed → Open:      failures within the window reach max_failures
//! Open → HalfOpen:    first call after `timeout` (evaluated lazily)
//! HalfOpen → Closed:  half_open_attempts consecutive probe successes
//! HalfOpen → Open:    any probe failure
//! ```
//!
//! State is process-local and never shared between instances.

use crate::error::BreakerError;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tandem_core::{BreakerConfig, Clock, ConfigError, Event, SystemClock};
use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of a breaker for operators
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    /// Failures currently inside the sliding window
    pub failure_count: usize,
    pub since_state_change: Duration,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: VecDeque<Instant>,
    state_since: Instant,
    half_open_successes: u32,
    half_open_in_flight: u32,
    /// Bumped on every transition; permits from an earlier period are stale
    period: u64,
}

impl Inner {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.failures.pop_front();
        }
    }

    fn enter(&mut self, state: BreakerState, now: Instant) {
        self.state = state;
        self.state_since = now;
        self.period += 1;
        self.half_open_successes = 0;
        self.half_open_in_flight = 0;
        if state == BreakerState::Closed {
            self.failures.clear();
        }
    }
}

/// Fails fast while a dependency is unhealthy and probes for recovery
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: BreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
    events: Option<broadcast::Sender<Event>>,
}

/// Admission to run the operation once.
///
/// Probes hold one of the limited half-open slots; dropping an unsettled
/// permit (the caller's future was cancelled) returns the slot. A permit
/// outliving the state period it was admitted in settles as a no-op.
struct Permit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
    period: u64,
    settled: bool,
}

impl<C: Clock> Drop for Permit<'_, C> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            let mut inner = self.breaker.lock();
            if inner.period == self.period {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
            }
        }
    }
}

impl CircuitBreaker<SystemClock> {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(
        name: impl Into<String>,
        config: BreakerConfig,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(name.into(), config, clock, None))
    }

    /// Construct from an already validated config
    pub(crate) fn build(
        name: String,
        config: BreakerConfig,
        clock: C,
        events: Option<broadcast::Sender<Event>>,
    ) -> Self {
        let now = clock.now();
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: VecDeque::new(),
                state_since: now,
                half_open_successes: 0,
                half_open_in_flight: 0,
                period: 0,
            }),
            events,
        }
    }

    /// Publish transitions on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Run `operation` through the breaker; every error counts as a failure
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_filtered(operation, |_| true).await
    }

    /// Run `operation` through the breaker, counting only errors for which
    /// `is_failure` returns true. Other errors are passed through without
    /// affecting the state.
    pub async fn call_filtered<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let permit = self.admit()?;
        match operation().await {
            Ok(value) => {
                self.record_success(permit);
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    self.record_failure(permit);
                } else {
                    self.record_ignored(permit);
                }
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn admit<E>(&self) -> Result<Permit<'_, C>, BreakerError<E>> {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.state == BreakerState::Open {
            let open_for = now.saturating_duration_since(inner.state_since);
            if open_for < self.config.timeout {
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                    retry_in: self.config.timeout - open_for,
                });
            }
            inner.enter(BreakerState::HalfOpen, now);
            drop(inner);
            tracing::info!(breaker = %self.name, "circuit half-open, probing");
            self.emit(Event::BreakerHalfOpen {
                name: self.name.clone(),
            });
            inner = self.lock();
        }

        match inner.state {
            BreakerState::Closed => Ok(Permit {
                breaker: self,
                probe: false,
                period: inner.period,
                settled: false,
            }),
            BreakerState::HalfOpen if inner.half_open_in_flight < self.config.half_open_attempts => {
                inner.half_open_in_flight += 1;
                Ok(Permit {
                    breaker: self,
                    probe: true,
                    period: inner.period,
                    settled: false,
                })
            }
            // All probe slots taken, or a probe re-opened the circuit meanwhile
            _ => Err(BreakerError::Open {
                name: self.name.clone(),
                retry_in: Duration::ZERO,
            }),
        }
    }

    /// Lock the state for a finished call. `None` when the call was admitted
    /// in an earlier state period and must not touch the current one.
    fn settle(&self, mut permit: Permit<'_, C>) -> Option<(std::sync::MutexGuard<'_, Inner>, bool)> {
        permit.settled = true;
        let (probe, period) = (permit.probe, permit.period);
        drop(permit);
        let mut inner = self.lock();
        if inner.period != period {
            tracing::debug!(breaker = %self.name, "ignoring result from an earlier state");
            return None;
        }
        if probe {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
        Some((inner, probe))
    }

    fn record_success(&self, permit: Permit<'_, C>) {
        let Some((mut inner, probe)) = self.settle(permit) else {
            return;
        };
        if !probe || inner.state != BreakerState::HalfOpen {
            return;
        }
        inner.half_open_successes += 1;
        if inner.half_open_successes >= self.config.half_open_attempts {
            inner.enter(BreakerState::Closed, self.clock.now());
            drop(inner);
            tracing::info!(breaker = %self.name, "circuit closed");
            self.emit(Event::BreakerClosed {
                name: self.name.clone(),
            });
        }
    }

    fn record_failure(&self, permit: Permit<'_, C>) {
        let now = self.clock.now();
        let Some((mut inner, _)) = self.settle(permit) else {
            return;
        };
        match inner.state {
            BreakerState::HalfOpen => {
                inner.enter(BreakerState::Open, now);
                drop(inner);
                tracing::warn!(breaker = %self.name, "probe failed, circuit re-opened");
                self.emit(Event::BreakerOpened {
                    name: self.name.clone(),
                    failures: 1,
                });
            }
            BreakerState::Closed => {
                inner.failures.push_back(now);
                inner.prune(now, self.config.failure_threshold_window);
                let failures = inner.failures.len();
                if failures >= self.config.max_failures as usize {
                    inner.enter(BreakerState::Open, now);
                    drop(inner);
                    tracing::warn!(
                        breaker = %self.name,
                        failures,
                        window_secs = self.config.failure_threshold_window.as_secs(),
                        "circuit opened"
                    );
                    self.emit(Event::BreakerOpened {
                        name: self.name.clone(),
                        failures,
                    });
                } else {
                    tracing::debug!(breaker = %self.name, failures, "failure recorded");
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_ignored(&self, permit: Permit<'_, C>) {
        let _ = self.settle(permit);
    }

    pub fn state(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.prune(now, self.config.failure_threshold_window);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len(),
            since_state_change: now.saturating_duration_since(inner.state_since),
        }
    }

    /// Force the breaker closed and forget recorded failures.
    /// Returns the state it was in.
    pub fn reset(&self) -> BreakerState {
        let now = self.clock.now();
        let mut inner = self.lock();
        let previous = inner.state;
        inner.enter(BreakerState::Closed, now);
        drop(inner);
        self.emit(Event::BreakerReset {
            name: self.name.clone(),
        });
        previous
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
