// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-core: shared types for distributed batch coordination
//!
//! This crate provides:
//! - Instance and batch lock records as stored in the coordination store
//! - The pure claim decision used by lock acquisition
//! - Clock and ID abstractions for deterministic tests
//! - Events and configuration shared by all tandem crates

pub mod batch_lock;
pub mod clock;
pub mod config;
pub mod event;
pub mod id;
pub mod instance;

pub use batch_lock::{BatchLock, Claim, TakeoverReason};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{BreakerConfig, ConfigError, CoordinationConfig, StoreConfig, TandemConfig};
pub use event::Event;
pub use id::{IdGen, InstanceId, SequentialIdGen, UuidIdGen};
pub use instance::{Instance, InstanceStatus};
