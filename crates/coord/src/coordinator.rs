// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process coordinator
//!
//! One [`Coordinator`] represents one running instance. It owns the instance
//! identity, the set of locks this process believes it holds, the background
//! heartbeat (and optional reaper) tasks and the event channel. Clones share
//! all of it.

use crate::error::CoordError;
use crate::{heartbeat, reaper};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tandem_core::{
    CoordinationConfig, Event, IdGen, Instance, InstanceId, InstanceStatus, UuidIdGen,
};
use tandem_store::{CoordinationStore, Precondition, StoreError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const EVENT_CAPACITY: usize = 256;

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder<S> {
    store: S,
    config: CoordinationConfig,
    instance_id: Option<InstanceId>,
    host_label: Option<String>,
    version: String,
}

impl<S: CoordinationStore> CoordinatorBuilder<S> {
    pub fn config(mut self, config: CoordinationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn instance_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Draw the instance id from a generator
    pub fn id_gen(mut self, id_gen: &impl IdGen) -> Self {
        self.instance_id = Some(id_gen.next_instance());
        self
    }

    pub fn host_label(mut self, host_label: impl Into<String>) -> Self {
        self.host_label = Some(host_label.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<Coordinator<S>, CoordError> {
        self.config.validate()?;
        let instance_id = self
            .instance_id
            .unwrap_or_else(|| UuidIdGen.next_instance());
        let host_label = self.host_label.unwrap_or_else(default_host_label);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Coordinator {
            inner: Arc::new(Inner {
                store: self.store,
                config: self.config,
                instance_id,
                host_label,
                version: self.version,
                events,
                held: Mutex::new(HashMap::new()),
                started: AtomicBool::new(false),
                running: tokio::sync::Mutex::new(None),
                releases: TaskTracker::new(),
            }),
        })
    }
}

fn default_host_label() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

/// Background tasks started by [`Coordinator::start`]
struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub(crate) struct Inner<S> {
    pub(crate) store: S,
    pub(crate) config: CoordinationConfig,
    pub(crate) instance_id: InstanceId,
    pub(crate) host_label: String,
    pub(crate) version: String,
    events: broadcast::Sender<Event>,
    /// batch_id -> acquired_at of every lock this process believes it holds
    pub(crate) held: Mutex<HashMap<String, DateTime<Utc>>>,
    started: AtomicBool,
    running: tokio::sync::Mutex<Option<Running>>,
    /// Releases spawned by dropped guards
    pub(crate) releases: TaskTracker,
}

/// Handle to this process's coordination state
pub struct Coordinator<S> {
    pub(crate) inner: Arc<Inner<S>>,
}

impl<S> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CoordinationStore> Coordinator<S> {
    pub fn builder(store: S) -> CoordinatorBuilder<S> {
        CoordinatorBuilder {
            store,
            config: CoordinationConfig::default(),
            instance_id: None,
            host_label: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Coordinator with a fresh UUID identity
    pub fn new(store: S, config: CoordinationConfig) -> Result<Self, CoordError> {
        Self::builder(store).config(config).build()
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inner.instance_id
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Subscribe to coordination events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: Event) {
        tracing::trace!(event = event.name(), "emit");
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    /// Batch ids this process believes it holds, sorted
    pub fn held_locks(&self) -> Vec<String> {
        let held = self.inner.held.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = held.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn remember(&self, batch_id: &str, acquired_at: DateTime<Utc>) {
        self.inner
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(batch_id.to_string(), acquired_at);
    }

    /// Drop a held entry, but only the acquisition it was recorded for
    pub(crate) fn forget(&self, batch_id: &str, acquired_at: DateTime<Utc>) {
        let mut held = self.inner.held.lock().unwrap_or_else(|e| e.into_inner());
        if held.get(batch_id) == Some(&acquired_at) {
            held.remove(batch_id);
        }
    }

    pub(crate) fn held_since(&self, batch_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(batch_id)
            .copied()
    }

    /// Register this instance and start the heartbeat.
    ///
    /// Also starts the reaper when `reap_interval` is configured. Calling
    /// `start` on a running coordinator does nothing.
    pub async fn start(&self) -> Result<(), CoordError> {
        let mut running = self.inner.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let now = self.inner.store.server_time().await?;
        let record = Instance::register(
            self.inner.instance_id.clone(),
            self.inner.host_label.clone(),
            self.inner.version.clone(),
            now,
        );
        self.inner
            .store
            .put_instance(&record, Precondition::Any)
            .await?;

        tracing::info!(
            instance = %self.inner.instance_id,
            host = %self.inner.host_label,
            version = %self.inner.version,
            "instance registered"
        );
        self.emit(Event::InstanceRegistered {
            instance_id: self.inner.instance_id.clone(),
            host_label: self.inner.host_label.clone(),
        });

        let token = CancellationToken::new();
        let mut tasks = vec![tokio::spawn(heartbeat::run(
            Arc::downgrade(&self.inner),
            self.inner.config.heartbeat_interval,
            token.clone(),
        ))];
        if let Some(interval) = self.inner.config.reap_interval {
            tasks.push(tokio::spawn(reaper::run(
                Arc::downgrade(&self.inner),
                interval,
                token.clone(),
            )));
        }

        *running = Some(Running { token, tasks });
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop background tasks, release every held lock and mark the instance stopped.
    ///
    /// Releases already scheduled by dropped guards are awaited first. Lock
    /// release failures are logged and do not stop the shutdown; the leases
    /// expire on their own.
    pub async fn stop(&self) -> Result<(), CoordError> {
        let mut running = self.inner.running.lock().await;
        let Some(Running { token, tasks }) = running.take() else {
            return Ok(());
        };
        self.inner.started.store(false, Ordering::SeqCst);

        token.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        self.set_status(InstanceStatus::Stopping).await;

        self.inner.releases.close();
        self.inner.releases.wait().await;
        self.inner.releases.reopen();

        let held: Vec<(String, DateTime<Utc>)> = self
            .inner
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(batch_id, acquired_at)| (batch_id.clone(), *acquired_at))
            .collect();
        for (batch_id, acquired_at) in held {
            if let Err(e) = self.release_owned(&batch_id, acquired_at).await {
                tracing::warn!(%batch_id, error = %e, "failed to release lock during shutdown");
                self.forget(&batch_id, acquired_at);
            }
        }

        let now = self.inner.store.server_time().await?;
        let record = match self.inner.store.get_instance(&self.inner.instance_id).await? {
            Some(current) => current.record,
            None => Instance::register(
                self.inner.instance_id.clone(),
                self.inner.host_label.clone(),
                self.inner.version.clone(),
                now,
            ),
        };
        self.inner
            .store
            .put_instance(
                &record.with_status(InstanceStatus::Stopped),
                Precondition::Any,
            )
            .await?;

        tracing::info!(instance = %self.inner.instance_id, "instance stopped");
        self.emit(Event::InstanceStopped {
            instance_id: self.inner.instance_id.clone(),
        });
        Ok(())
    }

    async fn set_status(&self, status: InstanceStatus) {
        let result = async {
            if let Some(current) = self.inner.store.get_instance(&self.inner.instance_id).await? {
                self.inner
                    .store
                    .put_instance(
                        &current.record.with_status(status),
                        Precondition::Version(current.version),
                    )
                    .await?;
            }
            Ok::<_, CoordError>(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(%status, error = %e, "failed to update instance status");
        }
    }

    /// Whether `id` has heartbeated within the heartbeat timeout.
    ///
    /// An instance with no record is dead.
    pub async fn is_instance_alive(&self, id: &InstanceId) -> Result<bool, CoordError> {
        let now = self.inner.store.server_time().await?;
        Ok(self.instance_alive_at(id, now).await?)
    }

    pub(crate) async fn instance_alive_at(
        &self,
        id: &InstanceId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let alive = self
            .inner
            .store
            .get_instance(id)
            .await?
            .is_some_and(|v| v.record.is_alive(now, self.inner.config.heartbeat_timeout));
        Ok(alive)
    }

    /// Active instances whose heartbeat is fresh
    pub async fn get_active_instances(&self) -> Result<Vec<Instance>, CoordError> {
        let now = self.inner.store.server_time().await?;
        let timeout = self.inner.config.heartbeat_timeout;
        let instances = self
            .inner
            .store
            .scan_instances(Some(InstanceStatus::Active))
            .await?
            .into_iter()
            .map(|v| v.record)
            .filter(|i| i.is_alive(now, timeout))
            .collect();
        Ok(instances)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
