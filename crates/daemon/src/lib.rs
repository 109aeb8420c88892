// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-daemon: long-running coordinator process
//!
//! Holds one instance's heartbeat, reaper and breakers for as long as the
//! process runs. The `tandemd` binary drives [`lifecycle`].

pub mod lifecycle;

pub use lifecycle::{startup, Config, DaemonState, DaemonStore, LifecycleError};
