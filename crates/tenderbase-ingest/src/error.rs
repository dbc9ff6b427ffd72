//! Error taxonomy of the pipeline.
//!
//! Row-level problems are [`SkipReason`]s: they drop the row, get counted,
//! and never surface as errors. Everything in [`IngestError`] is fatal and
//! terminates the run.

use std::collections::HashMap;

use tenderbase_store::StoreError;

/// Why a row was dropped. Enumerable so tests and operators can count
/// skips per cause instead of guessing at indistinguishable `continue`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SkipReason {
    #[error("malformed csv row")]
    BadRow,
    #[error("required field missing or blank")]
    MissingField,
    #[error("field exceeds its length ceiling")]
    TooLong,
    #[error("unparsable date")]
    BadDate,
    #[error("conclusion date precedes publication date")]
    DateOrder,
    #[error("unparsable numeric field")]
    BadNumber,
    #[error("non-positive numeric field")]
    NonPositive,
    #[error("malformed embedded json")]
    BadJson,
    #[error("no valid line items")]
    NoValidItems,
    #[error("duplicate product external id")]
    DuplicateProduct,
}

/// Per-reason skip counters for one run.
#[derive(Debug, Clone, Default)]
pub struct SkipCounts {
    counts: HashMap<SkipReason, u64>,
}

impl SkipCounts {
    pub fn note(&mut self, reason: SkipReason) {
        *self.counts.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: SkipReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, u64)> + '_ {
        self.counts.iter().map(|(&reason, &count)| (reason, count))
    }
}

/// Fatal conditions: unreadable source, reader-level csv failure, or a
/// store commit failure. Prior committed batches stay durable; the rest of
/// the run is lost.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv reader error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
