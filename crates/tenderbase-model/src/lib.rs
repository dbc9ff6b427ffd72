//! Tenderbase domain model
//!
//! Core entities for the procurement graph (organizations, categories,
//! products with attribute/value properties, contracts with order lines),
//! their natural keys, and the run-scoped [`IdentityMap`] that guarantees
//! at most one in-memory entity per distinct natural key for the lifetime
//! of an ingestion run.
//!
//! The store assigns surrogate ids ([`StoreId`]) at commit time; until then
//! entities are addressed through typed arena handles minted by the
//! identity map.

pub mod entities;
pub mod identity;
pub mod snapshot;

pub use entities::{
    AttributeId, Category, CategoryId, Contract, Order, OrgId, OrgKey, Organization, Product,
    ProductAttribute, ProductProperty, ProductValue, StoreId, ValueId,
};
pub use identity::{canonical_attribute_name, IdentityMap};
pub use snapshot::Snapshot;
