//! Store boundary for the ingestion pipeline.
//!
//! The pipeline talks to persistence only through [`Store`]: one bulk
//! snapshot read at startup to seed the identity map, and transactional
//! batched inserts of built aggregates. Each save call is a transaction
//! boundary: either the whole batch (plus any newly-referenced identity
//! entities) becomes durable, or none of it does.
//!
//! The real relational store is an external collaborator; [`MemoryStore`]
//! is the in-process implementation used by the CLI and tests. It enforces
//! the same natural-key uniqueness the relational schema would.

pub mod memory;

pub use memory::MemoryStore;

use tenderbase_model::{Contract, IdentityMap, Product, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated for {entity} {key}")]
    UniqueViolation { entity: &'static str, key: String },

    #[error("{entity} reference {key} does not exist")]
    MissingReference { entity: &'static str, key: String },

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store snapshot file is corrupt: {0}")]
    Corrupt(String),
}

pub trait Store {
    /// Bulk read of every existing natural key, taken once per run.
    fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Insert a batch of contract aggregates in one transaction. Newly
    /// minted organizations referenced by the batch are inserted first and
    /// their durable ids written back into the identity map.
    fn save_contracts(
        &mut self,
        batch: &[Contract],
        ids: &mut IdentityMap,
    ) -> Result<(), StoreError>;

    /// Insert a batch of product aggregates in one transaction, together
    /// with any newly minted categories, attributes and values they
    /// reference.
    fn save_products(&mut self, batch: &[Product], ids: &mut IdentityMap)
        -> Result<(), StoreError>;
}
