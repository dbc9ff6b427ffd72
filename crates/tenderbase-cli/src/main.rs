//! Tenderbase CLI
//!
//! Batch loader for procurement extracts:
//! - `tenderbase contracts <FILE>` ingests a contract CSV
//! - `tenderbase products <FILE>` ingests a product catalog CSV
//!
//! Store state lives in a single JSON file, loaded before the run and
//! written back after it. SIGINT requests a graceful stop: the current
//! buffer is flushed, the store is saved, and the run ends early.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use tenderbase_ingest::{
    load_contracts, load_products, IngestError, LoadOptions, LoadReport, DEFAULT_BATCH_SIZE,
};
use tenderbase_store::MemoryStore;

#[derive(Parser)]
#[command(name = "tenderbase")]
#[command(author, version, about = "Tenderbase: procurement extract loader")]
struct Cli {
    /// Verbose per-row logging (skips, batch commits).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a contract extract (`;`-delimited CSV with an Orders JSON column).
    Contracts(LoadArgs),
    /// Load a product catalog extract (`;`-delimited CSV with a Properties JSON column).
    Products(LoadArgs),
}

#[derive(Args)]
struct LoadArgs {
    /// Path to the CSV extract.
    input: PathBuf,

    /// Records per commit transaction.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Store file; created on first use.
    #[arg(long, default_value = "tenderbase-store.json")]
    store: PathBuf,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(
    args: &LoadArgs,
    cancel: Arc<AtomicBool>,
    load: fn(&mut MemoryStore, &std::path::Path, &LoadOptions) -> Result<LoadReport, IngestError>,
) -> Result<()> {
    let mut store = MemoryStore::load(&args.store)
        .with_context(|| format!("failed to open store {}", args.store.display()))?;
    let options = LoadOptions {
        batch_size: args.batch_size,
        cancel: Some(cancel),
    };

    let report = load(&mut store, &args.input, &options)
        .with_context(|| format!("failed to load {}", args.input.display()))?;

    store
        .save_to(&args.store)
        .with_context(|| format!("failed to save store {}", args.store.display()))?;

    for (reason, count) in report.skipped.iter() {
        tracing::info!(%reason, count, "skipped rows");
    }
    tracing::info!(
        total = report.total,
        saved_batches = report.saved_batches,
        skipped = report.skipped.total(),
        cancelled = report.cancelled,
        "load complete"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))
        .context("failed to register SIGINT handler")?;

    match &cli.command {
        Commands::Contracts(args) => run(args, cancel, load_contracts::<MemoryStore>),
        Commands::Products(args) => run(args, cancel, load_products::<MemoryStore>),
    }
}
