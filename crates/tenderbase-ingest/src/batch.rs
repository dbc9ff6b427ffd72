//! Batch committer: bounded buffering between the builder and the store.
//!
//! Aggregates accumulate in memory; every `batch_size` records the buffer
//! goes to the store inside one transaction and progress is reported. A
//! failing save is fatal to the run; the committer does not retry.

use tenderbase_model::{Contract, IdentityMap, Product};
use tenderbase_store::{Store, StoreError};

/// Where a full buffer goes. One implementation per aggregate kind so the
/// committer itself stays generic.
pub trait BatchSink<T> {
    fn save_batch(&mut self, batch: &[T], ids: &mut IdentityMap) -> Result<(), StoreError>;
}

pub struct ContractSink<'a, S: Store>(pub &'a mut S);

impl<S: Store> BatchSink<Contract> for ContractSink<'_, S> {
    fn save_batch(&mut self, batch: &[Contract], ids: &mut IdentityMap) -> Result<(), StoreError> {
        self.0.save_contracts(batch, ids)
    }
}

pub struct ProductSink<'a, S: Store>(pub &'a mut S);

impl<S: Store> BatchSink<Product> for ProductSink<'_, S> {
    fn save_batch(&mut self, batch: &[Product], ids: &mut IdentityMap) -> Result<(), StoreError> {
        self.0.save_products(batch, ids)
    }
}

/// Running totals surfaced for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Records seen this run (buffered or committed).
    pub total: u64,
    /// Flushes performed, the final partial one included.
    pub saved_batches: u32,
}

pub struct BatchCommitter<T, S> {
    sink: S,
    buffer: Vec<T>,
    batch_size: usize,
    total: u64,
    saved_batches: u32,
}

impl<T, S: BatchSink<T>> BatchCommitter<T, S> {
    pub fn new(sink: S, batch_size: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            batch_size: batch_size.max(1),
            total: 0,
            saved_batches: 0,
        }
    }

    /// Buffer one aggregate, flushing when the buffer reaches the batch
    /// size.
    pub fn add(&mut self, item: T, ids: &mut IdentityMap) -> Result<(), StoreError> {
        self.buffer.push(item);
        self.total += 1;
        if self.buffer.len() >= self.batch_size {
            self.flush(ids)?;
        }
        Ok(())
    }

    fn flush(&mut self, ids: &mut IdentityMap) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.save_batch(&self.buffer, ids)?;
        self.buffer.clear();
        self.saved_batches += 1;
        tracing::info!(
            total = self.total,
            saved_batches = self.saved_batches,
            "batch committed"
        );
        Ok(())
    }

    /// Final partial flush at end of stream (or on cancellation), then the
    /// run totals.
    pub fn finish(mut self, ids: &mut IdentityMap) -> Result<Progress, StoreError> {
        self.flush(ids)?;
        Ok(Progress {
            total: self.total,
            saved_batches: self.saved_batches,
        })
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn saved_batches(&self) -> u32 {
        self.saved_batches
    }
}
