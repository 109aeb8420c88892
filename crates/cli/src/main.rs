// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tandem - operator CLI for batch coordination state
//!
//! Reads and repairs the shared store directly. Nothing here registers an
//! instance or heartbeats.

mod commands;
mod error;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{instances, locks, reap};
use std::path::{Path, PathBuf};
use tandem_coord::Coordinator;
use tandem_core::TandemConfig;
use tandem_store::AnyStore;

use crate::error::TandemError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "tandem",
    version,
    about = "Tandem - inspect and repair distributed batch locks"
)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "tandem.toml")]
    config: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered instances
    Instances(instances::InstancesArgs),
    /// List batch locks
    Locks,
    /// Show the live holder of a batch lock
    Holder(locks::HolderArgs),
    /// Mark dead instances stopped and release their locks
    Reap,
    /// Release a batch lock held by a dead or expired holder
    Release(locks::ReleaseArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let coordinator = connect(&cli.config)?;

    match cli.command {
        Commands::Instances(args) => instances::instances(&coordinator, args, cli.format).await,
        Commands::Locks => locks::locks(&coordinator, cli.format).await,
        Commands::Holder(args) => locks::holder(&coordinator, args, cli.format).await,
        Commands::Reap => reap::reap(&coordinator, cli.format).await,
        Commands::Release(args) => locks::release(&coordinator, args, cli.format).await,
    }
}

/// Open the configured store behind an unstarted coordinator
fn connect(config_path: &Path) -> Result<Coordinator<AnyStore>> {
    let settings = TandemConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let store = AnyStore::open(&settings.store)?;
    if let AnyStore::Memory(_) = store {
        return Err(TandemError::memory_store().into());
    }

    let coordinator = Coordinator::builder(store)
        .config(settings.coordination)
        .instance_id(format!("cli-{}", std::process::id()))
        .build()?;
    Ok(coordinator)
}

/// Log to stderr, quiet unless RUST_LOG says otherwise
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
