// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-breaker: per-dependency circuit breakers
//!
//! Wrap calls to an external dependency in a [`CircuitBreaker`] (or go
//! through a [`BreakerRegistry`] keyed by dependency name) to stop calling
//! it while it keeps failing and to probe for recovery afterwards.

mod breaker;
mod error;
mod registry;

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use error::BreakerError;
pub use registry::BreakerRegistry;
