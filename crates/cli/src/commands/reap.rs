// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tandem reap` - one dead-instance sweep

use anyhow::Result;
use tandem_coord::Coordinator;
use tandem_store::AnyStore;

use crate::output::{print, OutputFormat, ReapView};

pub async fn reap(coordinator: &Coordinator<AnyStore>, format: OutputFormat) -> Result<()> {
    let reaped = coordinator.cleanup_dead_instances().await?;
    print(&ReapView { reaped }, format);
    Ok(())
}
