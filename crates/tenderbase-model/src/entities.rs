//! Entities and aggregates of the procurement graph.
//!
//! Field-length ceilings mirror the relational schema; the parsers enforce
//! them before an entity is ever constructed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Surrogate id assigned by the store when a row becomes durable.
pub type StoreId = i32;

/// Ceiling for free-text names (organization, category title, product name,
/// attribute name, contract number).
pub const MAX_NAME: usize = 511;
/// Ceiling for the Inn tax-registration code.
pub const MAX_INN: usize = 12;
/// Ceiling for the Kpp tax-registration code.
pub const MAX_KPP: usize = 9;
/// Ceiling for the Kpgz catalog classification code.
pub const MAX_KPGZ: usize = 32;
/// Ceiling for a property value literal.
pub const MAX_VALUE: usize = 255;

// ============================================================================
// Run-scoped handles
// ============================================================================

/// Handle to an organization in the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrgId(pub(crate) u32);

/// Handle to a category in the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategoryId(pub(crate) u32);

/// Handle to a product attribute in the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeId(pub(crate) u32);

/// Handle to a product value in the identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) u32);

// ============================================================================
// Identity-mapped entities
// ============================================================================

/// Natural key of an organization: the `(Inn, Kpp)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgKey {
    pub inn: String,
    pub kpp: String,
}

/// A customer or provider organization.
#[derive(Debug, Clone)]
pub struct Organization {
    /// `Some` once the row is durable (pre-seeded or committed this run).
    pub store_id: Option<StoreId>,
    pub name: String,
    pub inn: String,
    pub kpp: String,
}

/// A catalog category, keyed by its Kpgz classification code.
#[derive(Debug, Clone)]
pub struct Category {
    pub store_id: Option<StoreId>,
    pub title: String,
    pub kpgz: String,
}

/// A product attribute (e.g. "Длина"), keyed by name.
#[derive(Debug, Clone)]
pub struct ProductAttribute {
    pub store_id: Option<StoreId>,
    pub name: String,
}

/// A property value literal. Not unique by name alone; uniqueness is scoped
/// to the `(Attribute, Value)` pair at the property level.
#[derive(Debug, Clone)]
pub struct ProductValue {
    pub store_id: Option<StoreId>,
    pub name: String,
}

// ============================================================================
// Aggregates
// ============================================================================

/// One `(Attribute, Value)` pair attached to a product. No duplicate pair
/// per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductProperty {
    pub attribute: AttributeId,
    pub value: ValueId,
}

/// A catalog product aggregate: category reference, properties, and the
/// derived flat lists of distinct attributes and values (the schema models
/// both a join-collection and direct property rows).
#[derive(Debug, Clone)]
pub struct Product {
    pub external_id: i64,
    pub name: String,
    pub category: CategoryId,
    pub properties: Vec<ProductProperty>,
    pub attributes: Vec<AttributeId>,
    pub values: Vec<ValueId>,
}

/// A contract line item. References an already-persisted product.
#[derive(Debug, Clone)]
pub struct Order {
    pub product: StoreId,
    pub quantity: Decimal,
    pub amount: Decimal,
}

/// A contract aggregate with its customer, provider and order lines.
#[derive(Debug, Clone)]
pub struct Contract {
    pub number: String,
    pub public_at: DateTime<Utc>,
    pub conclusion_at: Option<DateTime<Utc>>,
    pub price: Decimal,
    pub customer: OrgId,
    pub provider: OrgId,
    pub orders: Vec<Order>,
}
