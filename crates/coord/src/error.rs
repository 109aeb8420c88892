// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination errors

use std::time::Duration;
use tandem_core::{ConfigError, InstanceId};
use tandem_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordError {
    /// Contention outlasted the caller's wait budget
    #[error("another instance is processing this batch: {batch_id}")]
    LockBusy {
        batch_id: String,
        /// Last holder observed, if the final attempt saw one
        holder: Option<InstanceId>,
        waited: Duration,
    },
    #[error("lock on batch {batch_id} is no longer held by this instance")]
    OwnershipLost { batch_id: String },
    #[error("coordinator not started")]
    NotStarted,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("coordination store error: {0}")]
    Store(#[from] StoreError),
}

impl CoordError {
    /// Contention rather than a fault; callers usually skip or defer
    pub fn is_busy(&self) -> bool {
        matches!(self, CoordError::LockBusy { .. })
    }
}
