// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination store in a JSON file on a shared filesystem
//!
//! Every operation runs under an advisory lock on `<path>.lock`: shared for
//! reads, exclusive for writes. A write reads the document, applies the
//! conditional change and replaces the file through an atomic rename, so
//! readers never see a partial document and two processes cannot interleave
//! a read-modify-write.

use crate::document::Document;
use crate::store::{CoordinationStore, Precondition, StoreError, Versioned};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_core::{BatchLock, Clock, Instance, InstanceId, InstanceStatus, SystemClock};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Store backed by one JSON document on disk
#[derive(Clone)]
pub struct FileStore<C: Clock = SystemClock> {
    path: Arc<PathBuf>,
    clock: C,
}

impl FileStore<SystemClock> {
    /// Open a store at `path`, creating parent directories as needed.
    /// The document itself is created by the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> FileStore<C> {
    pub fn open_with_clock(path: impl Into<PathBuf>, clock: C) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: Arc::new(path),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run<T, F>(&self, access: Access, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> Result<T, StoreError> + Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || transact(&path, access, f))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn transact<T>(
    path: &Path,
    access: Access,
    f: impl FnOnce(&mut Document) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path(path))?;
    match access {
        Access::Read => fs2::FileExt::lock_shared(&lock_file)?,
        Access::Write => fs2::FileExt::lock_exclusive(&lock_file)?,
    }

    // The advisory lock is released when `lock_file` drops
    let mut doc = read_document(path)?;
    let out = f(&mut doc)?;
    if access == Access::Write {
        write_document(path, &doc)?;
    }
    Ok(out)
}

fn read_document(path: &Path) -> Result<Document, StoreError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() {
        return Ok(Document::default());
    }
    Ok(serde_json::from_slice(&content)?)
}

fn write_document(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    serde_json::to_writer_pretty(&mut file, doc)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl<C: Clock> CoordinationStore for FileStore<C> {
    async fn server_time(&self) -> Result<DateTime<Utc>, StoreError> {
        // Instances sharing a filesystem are expected to share a clock source
        Ok(self.clock.utc_now())
    }

    async fn get_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<Versioned<Instance>>, StoreError> {
        let id = id.clone();
        self.run(Access::Read, move |doc| Ok(doc.get_instance(&id)))
            .await
    }

    async fn put_instance(
        &self,
        instance: &Instance,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        let instance = instance.clone();
        self.run(Access::Write, move |doc| doc.put_instance(&instance, expected))
            .await
    }

    async fn scan_instances(
        &self,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Versioned<Instance>>, StoreError> {
        self.run(Access::Read, move |doc| Ok(doc.scan_instances(status)))
            .await
    }

    async fn get_lock(&self, batch_id: &str) -> Result<Option<Versioned<BatchLock>>, StoreError> {
        let batch_id = batch_id.to_string();
        self.run(Access::Read, move |doc| Ok(doc.get_lock(&batch_id)))
            .await
    }

    async fn put_lock(
        &self,
        lock: &BatchLock,
        expected: Precondition,
    ) -> Result<u64, StoreError> {
        let lock = lock.clone();
        self.run(Access::Write, move |doc| doc.put_lock(&lock, expected))
            .await
    }

    async fn delete_lock(
        &self,
        batch_id: &str,
        expected: Precondition,
    ) -> Result<bool, StoreError> {
        let batch_id = batch_id.to_string();
        self.run(Access::Write, move |doc| doc.delete_lock(&batch_id, expected))
            .await
    }

    async fn scan_locks(
        &self,
        holder: Option<&InstanceId>,
    ) -> Result<Vec<Versioned<BatchLock>>, StoreError> {
        let holder = holder.cloned();
        self.run(Access::Read, move |doc| Ok(doc.scan_locks(holder.as_ref())))
            .await
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
