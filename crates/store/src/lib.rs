// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-store: shared record store for tandem coordinators
//!
//! All cross-instance state lives in a [`CoordinationStore`]. Two backends
//! are provided: [`MemoryStore`] for tests and single-process use, and
//! [`FileStore`] for instances sharing a filesystem. [`AnyStore`] picks one
//! from configuration.

mod configured;
pub mod document;
mod file;
mod memory;
mod store;
mod traced;

pub use configured::AnyStore;
pub use document::Document;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{CoordinationStore, Precondition, StoreError, Versioned};
pub use traced::TracedStore;
