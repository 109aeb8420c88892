// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-coord: instance heartbeat, batch locks and dead-instance reaping
//!
//! A [`Coordinator`] registers this process in the shared store, keeps its
//! heartbeat fresh, and hands out [`LockGuard`]s for batch-level critical
//! sections. Locks held by crashed peers are recovered by takeover once
//! their lease expires or their heartbeat goes stale, or earlier by the
//! reaper.

mod coordinator;
mod error;
mod heartbeat;
mod lock;
mod reaper;

#[cfg(test)]
mod test_support;

pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use error::CoordError;
pub use lock::LockGuard;
