// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One circuit breaker per dependency name
//!
//! Breakers are created on first use and cached for the registry's
//! lifetime. Tripping one dependency never affects another.

use crate::breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
use crate::error::BreakerError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tandem_core::{BreakerConfig, Clock, ConfigError, Event, SystemClock};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

pub struct BreakerRegistry<C: Clock = SystemClock> {
    defaults: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    clock: C,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker<C>>>>,
    events: broadcast::Sender<Event>,
}

impl BreakerRegistry<SystemClock> {
    pub fn new(defaults: BreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(defaults, SystemClock)
    }
}

impl<C: Clock> BreakerRegistry<C> {
    pub fn with_clock(defaults: BreakerConfig, clock: C) -> Result<Self, ConfigError> {
        defaults.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            defaults,
            overrides: HashMap::new(),
            clock,
            breakers: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Use `config` instead of the defaults for breakers named `name`
    pub fn with_override(
        mut self,
        name: impl Into<String>,
        config: BreakerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        self.overrides.insert(name.into(), config);
        Ok(self)
    }

    /// Subscribe to transitions of every breaker in this registry
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn breakers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<CircuitBreaker<C>>>> {
        self.breakers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The breaker for `name`, created on first use
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker<C>> {
        let mut breakers = self.breakers();
        if let Some(breaker) = breakers.get(name) {
            return Arc::clone(breaker);
        }
        let config = self
            .overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone());
        tracing::debug!(breaker = name, "circuit breaker created");
        let breaker = Arc::new(CircuitBreaker::build(
            name.to_string(),
            config,
            self.clock.clone(),
            Some(self.events.clone()),
        ));
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Run `operation` through the breaker for `name`
    pub async fn call<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get(name).call(operation).await
    }

    /// State of an existing breaker; `None` if `name` has never been used
    pub fn state(&self, name: &str) -> Option<BreakerSnapshot> {
        let breaker = self.breakers().get(name).cloned();
        breaker.map(|b| b.state())
    }

    /// States of all breakers, sorted by name
    pub fn states(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker<C>>> = self.breakers().values().cloned().collect();
        let mut states: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.state()).collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }

    /// Operator override: close one breaker. Returns `false` for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        let breaker = self.breakers().get(name).cloned();
        let Some(breaker) = breaker else {
            return false;
        };
        let previous = breaker.reset();
        tracing::warn!(target: "audit", breaker = name, %previous, "circuit breaker manually reset");
        true
    }

    /// Operator override: close every breaker. Returns how many were not closed.
    pub fn reset_all(&self) -> usize {
        let breakers: Vec<Arc<CircuitBreaker<C>>> = self.breakers().values().cloned().collect();
        let mut tripped = 0;
        for breaker in breakers {
            if breaker.reset() != BreakerState::Closed {
                tripped += 1;
            }
        }
        tracing::warn!(target: "audit", tripped, "all circuit breakers manually reset");
        tripped
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
