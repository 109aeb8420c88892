// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tandem instances` - registered coordinator instances

use anyhow::Result;
use clap::Args;
use tandem_coord::Coordinator;
use tandem_store::{AnyStore, CoordinationStore};

use crate::output::{print_table, InstanceRow, OutputFormat, INSTANCE_HEADER};

#[derive(Args)]
pub struct InstancesArgs {
    /// Only show active instances with a fresh heartbeat
    #[arg(long)]
    pub alive: bool,
}

pub async fn instances(
    coordinator: &Coordinator<AnyStore>,
    args: InstancesArgs,
    format: OutputFormat,
) -> Result<()> {
    let store = coordinator.store();
    let now = store.server_time().await?;
    let timeout = coordinator.config().heartbeat_timeout;

    let instances = if args.alive {
        coordinator.get_active_instances().await?
    } else {
        store
            .scan_instances(None)
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect()
    };

    let mut rows: Vec<InstanceRow> = instances
        .iter()
        .map(|i| InstanceRow::new(i, now, timeout))
        .collect();
    rows.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

    print_table(INSTANCE_HEADER, "No instances", &rows, format);
    Ok(())
}
