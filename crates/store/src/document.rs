// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned record document shared by the memory and file stores

use crate::store::{Precondition, StoreError, Versioned};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tandem_core::{BatchLock, Instance, InstanceId, InstanceStatus};

pub(crate) const INSTANCES: &str = "instances";
pub(crate) const BATCH_LOCKS: &str = "batch_locks";

/// Both record sets plus the version counter
///
/// Versions are drawn from one counter for the whole document, so a record
/// deleted and recreated never reuses a version a stale reader might hold.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    next_version: u64,
    #[serde(default)]
    instances: BTreeMap<String, Versioned<Instance>>,
    #[serde(default)]
    batch_locks: BTreeMap<String, Versioned<BatchLock>>,
}

impl Document {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    pub fn get_instance(&self, id: &InstanceId) -> Option<Versioned<Instance>> {
        self.instances.get(id.as_str()).cloned()
    }

    pub fn put_instance(
        &mut self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        let key = instance.instance_id.as_str();
        let current = self.instances.get(key).map(|v| v.version);
        if !expected.holds(current) {
            return Err(StoreError::Conflict {
                collection: INSTANCES,
                key: key.to_string(),
            });
        }
        let version = self.bump();
        self.instances.insert(
            key.to_string(),
            Versioned {
                version,
                record: instance.clone(),
            },
        );
        Ok(version)
    }

    pub fn scan_instances(&self, status: Option<InstanceStatus>) -> Vec<Versioned<Instance>> {
        self.instances
            .values()
            .filter(|v| status.map_or(true, |s| v.record.status == s))
            .cloned()
            .collect()
    }

    pub fn get_lock(&self, batch_id: &str) -> Option<Versioned<BatchLock>> {
        self.batch_locks.get(batch_id).cloned()
    }

    pub fn put_lock(&mut self, lock: &BatchLock, expected: Precondition) -> Result<u64, StoreError> {
        let key = lock.batch_id.as_str();
        let current = self.batch_locks.get(key).map(|v| v.version);
        if !expected.holds(current) {
            return Err(StoreError::Conflict {
                collection: BATCH_LOCKS,
                key: key.to_string(),
            });
        }
        let version = self.bump();
        self.batch_locks.insert(
            key.to_string(),
            Versioned {
                version,
                record: lock.clone(),
            },
        );
        Ok(version)
    }

    pub fn delete_lock(&mut self, batch_id: &str, expected: Precondition) -> Result<bool, StoreError> {
        let Some(current) = self.batch_locks.get(batch_id).map(|v| v.version) else {
            return Ok(false);
        };
        if !expected.holds(Some(current)) {
            return Err(StoreError::Conflict {
                collection: BATCH_LOCKS,
                key: batch_id.to_string(),
            });
        }
        self.batch_locks.remove(batch_id);
        Ok(true)
    }

    pub fn scan_locks(&self, holder: Option<&InstanceId>) -> Vec<Versioned<BatchLock>> {
        self.batch_locks
            .values()
            .filter(|v| holder.map_or(true, |h| &v.record.holder_instance_id == h))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
