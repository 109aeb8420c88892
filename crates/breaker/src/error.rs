// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;
use thiserror::Error;

/// Result of a call through a circuit breaker.
///
/// `Open` is a control signal, not a fault: the operation was never invoked
/// and the caller should skip or defer. `Inner` is the operation's own error.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit open for {name}, retry in {retry_in:?}")]
    Open { name: String, retry_in: Duration },
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's error, or `None` for a fast-fail
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(e) => Some(e),
        }
    }
}
