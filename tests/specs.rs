// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for tandem.
//!
//! End-to-end scenarios across the store, coordinator and breaker crates,
//! with several coordinators sharing one store the way separate processes
//! would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// coordination/
#[path = "specs/coordination/crash_takeover.rs"]
mod coordination_crash_takeover;
#[path = "specs/coordination/mutual_exclusion.rs"]
mod coordination_mutual_exclusion;
#[path = "specs/coordination/shared_file.rs"]
mod coordination_shared_file;

// breaker/
#[path = "specs/breaker/recovery.rs"]
mod breaker_recovery;
