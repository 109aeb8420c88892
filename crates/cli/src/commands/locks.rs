// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tandem locks`, `tandem holder` and `tandem release`

use anyhow::Result;
use clap::Args;
use tandem_coord::{CoordError, Coordinator};
use tandem_core::BatchLock;
use tandem_store::{AnyStore, CoordinationStore};

use crate::error::TandemError;
use crate::output::{
    print, print_table, HolderView, LockRow, OutputFormat, ReleaseView, LOCK_HEADER,
};

#[derive(Args)]
pub struct HolderArgs {
    /// Batch id
    pub batch_id: String,
}

#[derive(Args)]
pub struct ReleaseArgs {
    /// Batch id
    pub batch_id: String,
    /// Release even if the holder is alive and its lease is current
    #[arg(long)]
    pub force: bool,
}

pub async fn locks(coordinator: &Coordinator<AnyStore>, format: OutputFormat) -> Result<()> {
    let store = coordinator.store();
    let now = store.server_time().await?;

    let mut rows = Vec::new();
    for lock in store.scan_locks(None).await? {
        let alive = coordinator
            .is_instance_alive(&lock.record.holder_instance_id)
            .await?;
        rows.push(LockRow::new(&lock.record, now, alive));
    }
    rows.sort_by(|a, b| a.batch_id.cmp(&b.batch_id));

    print_table(LOCK_HEADER, "No locks", &rows, format);
    Ok(())
}

pub async fn holder(
    coordinator: &Coordinator<AnyStore>,
    args: HolderArgs,
    format: OutputFormat,
) -> Result<()> {
    let holder = coordinator.get_lock_holder(&args.batch_id).await?;
    print(
        &HolderView {
            batch_id: args.batch_id,
            holder: holder.map(|h| h.to_string()),
        },
        format,
    );
    Ok(())
}

pub async fn release(
    coordinator: &Coordinator<AnyStore>,
    args: ReleaseArgs,
    format: OutputFormat,
) -> Result<()> {
    let released = if args.force {
        coordinator.force_release(&args.batch_id).await?
    } else {
        release_abandoned(coordinator, &args.batch_id).await?
    };
    print(
        &ReleaseView {
            batch_id: args.batch_id,
            released_from: released.map(|l| l.holder_instance_id.to_string()),
        },
        format,
    );
    Ok(())
}

/// Delete the lock only if its holder is dead or its lease expired, and only
/// the exact record that was checked
async fn release_abandoned(
    coordinator: &Coordinator<AnyStore>,
    batch_id: &str,
) -> Result<Option<BatchLock>> {
    let store = coordinator.store();
    let now = store.server_time().await?;
    let Some(current) = store.get_lock(batch_id).await? else {
        return Ok(None);
    };

    let lock = &current.record;
    if !lock.is_expired(now)
        && coordinator
            .is_instance_alive(&lock.holder_instance_id)
            .await?
    {
        return Err(TandemError::release_refused(
            batch_id,
            lock.holder_instance_id.as_str(),
            (lock.expires_at - now).num_seconds(),
        )
        .into());
    }

    match coordinator.force_release_if(current).await {
        Err(CoordError::Store(e)) if e.is_conflict() => {
            Err(TandemError::release_conflict(batch_id).into())
        }
        other => Ok(other?),
    }
}
