//! Tenderbase ingestion pipeline
//!
//! Turns large semi-structured CSV extracts (contracts and catalog
//! products, one embedded JSON column per row) into a consistent
//! relational graph, committed to the store in bounded batches:
//!
//! ```text
//! file ──► parser ──► resolve ──► build ──► batch committer ──► store
//!          (skip or   (identity   (pure      (buffer + commit
//!           record)     map)      assembly)   every N records)
//! ```
//!
//! The pipeline is single-threaded and strictly sequential per record.
//! Row-level problems are absorbed as counted skips; I/O and store
//! failures are fatal. Identity state lives for exactly one run and is
//! re-derived from the store on the next one.

pub mod batch;
pub mod build;
pub mod contract;
pub mod error;
mod fields;
mod json;
pub mod product;
pub mod resolve;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tenderbase_model::IdentityMap;
use tenderbase_store::Store;

use crate::batch::{BatchCommitter, ContractSink, ProductSink};
use crate::build::{build_contract, build_product};
use crate::contract::ContractReader;
use crate::product::ProductReader;
use crate::resolve::{resolve_contract, resolve_product};

pub use crate::error::{IngestError, SkipCounts, SkipReason};

/// Records per commit transaction unless overridden.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch_size: usize,
    /// Checked at record boundaries only; buffered aggregates are flushed
    /// before cancellation is honored.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one load run.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Records that survived validation and resolution.
    pub total: u64,
    /// Commit transactions performed, the final partial one included.
    pub saved_batches: u32,
    /// Rows dropped, by cause.
    pub skipped: SkipCounts,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

fn note_skip(skipped: &mut SkipCounts, line: u64, reason: SkipReason) {
    skipped.note(reason);
    tracing::debug!(line, %reason, "row skipped");
}

/// Ingest a contract extract. Seeds the identity map from the store, then
/// parses, resolves, builds and batch-commits strictly in sequence.
pub fn load_contracts<S: Store>(
    store: &mut S,
    path: &Path,
    options: &LoadOptions,
) -> Result<LoadReport, IngestError> {
    let mut ids = IdentityMap::from_snapshot(store.snapshot()?);
    let mut reader = ContractReader::open(path)?;
    let mut skipped = SkipCounts::default();
    let mut committer = BatchCommitter::new(ContractSink(store), options.batch_size);
    let mut cancelled = false;

    loop {
        if options.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(parsed) = reader.next_row()? else {
            break;
        };
        let record = match parsed {
            Ok(record) => record,
            Err(reason) => {
                note_skip(&mut skipped, reader.line(), reason);
                continue;
            }
        };
        let resolved = match resolve_contract(record, &mut ids) {
            Ok(resolved) => resolved,
            Err(reason) => {
                note_skip(&mut skipped, reader.line(), reason);
                continue;
            }
        };
        committer.add(build_contract(resolved), &mut ids)?;
    }

    let progress = committer.finish(&mut ids)?;
    if cancelled {
        tracing::warn!(
            total = progress.total,
            "load cancelled; pending buffer was flushed"
        );
    }
    tracing::info!(
        total = progress.total,
        saved_batches = progress.saved_batches,
        skipped = skipped.total(),
        "contract load finished"
    );
    Ok(LoadReport {
        total: progress.total,
        saved_batches: progress.saved_batches,
        skipped,
        cancelled,
    })
}

/// Ingest a product extract. Same shape as [`load_contracts`].
pub fn load_products<S: Store>(
    store: &mut S,
    path: &Path,
    options: &LoadOptions,
) -> Result<LoadReport, IngestError> {
    let mut ids = IdentityMap::from_snapshot(store.snapshot()?);
    let mut reader = ProductReader::open(path)?;
    let mut skipped = SkipCounts::default();
    let mut committer = BatchCommitter::new(ProductSink(store), options.batch_size);
    let mut cancelled = false;

    loop {
        if options.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(parsed) = reader.next_row()? else {
            break;
        };
        let record = match parsed {
            Ok(record) => record,
            Err(reason) => {
                note_skip(&mut skipped, reader.line(), reason);
                continue;
            }
        };
        let resolved = match resolve_product(record, &mut ids) {
            Ok(resolved) => resolved,
            Err(reason) => {
                note_skip(&mut skipped, reader.line(), reason);
                continue;
            }
        };
        committer.add(build_product(resolved), &mut ids)?;
    }

    let progress = committer.finish(&mut ids)?;
    if cancelled {
        tracing::warn!(
            total = progress.total,
            "load cancelled; pending buffer was flushed"
        );
    }
    tracing::info!(
        total = progress.total,
        saved_batches = progress.saved_batches,
        skipped = skipped.total(),
        "product load finished"
    );
    Ok(LoadReport {
        total: progress.total,
        saved_batches: progress.saved_batches,
        skipped,
        cancelled,
    })
}
