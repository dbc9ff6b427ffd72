//! In-memory store with natural-key indexes and JSON file persistence.
//!
//! Saves are two-phase: every constraint is checked against the committed
//! state before anything is applied, so a failing batch leaves the store
//! untouched (the rollback semantics the pipeline relies on). Row vectors
//! are the durable state; the key indexes are rebuilt on load.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tenderbase_model::snapshot::{
    SnapshotAttribute, SnapshotCategory, SnapshotOrganization, SnapshotProduct, SnapshotValue,
};
use tenderbase_model::{
    AttributeId, CategoryId, Contract, IdentityMap, OrgId, Product, Snapshot, StoreId, ValueId,
};

use crate::{Store, StoreError};

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrganizationRow {
    id: StoreId,
    name: String,
    inn: String,
    kpp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryRow {
    id: StoreId,
    title: String,
    kpgz: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttributeRow {
    id: StoreId,
    name: String,
}

/// Value rows carry the attribute they are paired with so the
/// `(attribute, value)` dictionary can be rebuilt without a join.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValueRow {
    id: StoreId,
    attribute_id: StoreId,
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductRow {
    id: StoreId,
    external_id: i64,
    name: String,
    category_id: StoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyRow {
    product_id: StoreId,
    attribute_id: StoreId,
    value_id: StoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContractRow {
    id: StoreId,
    number: String,
    public_at: DateTime<Utc>,
    conclusion_at: Option<DateTime<Utc>>,
    price: Decimal,
    customer_id: StoreId,
    provider_id: StoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderRow {
    id: StoreId,
    contract_id: StoreId,
    product_id: StoreId,
    quantity: Decimal,
    amount: Decimal,
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Default)]
struct Indexes {
    org_keys: HashMap<(String, String), StoreId>,
    category_keys: HashMap<String, StoreId>,
    attribute_keys: HashMap<String, StoreId>,
    value_keys: HashMap<(StoreId, String), StoreId>,
    product_external: HashMap<i64, StoreId>,
    product_ids: HashSet<StoreId>,
    property_keys: HashSet<(StoreId, StoreId, StoreId)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    next_id: StoreId,
    organizations: Vec<OrganizationRow>,
    categories: Vec<CategoryRow>,
    attributes: Vec<AttributeRow>,
    values: Vec<ValueRow>,
    products: Vec<ProductRow>,
    properties: Vec<PropertyRow>,
    contracts: Vec<ContractRow>,
    orders: Vec<OrderRow>,
    #[serde(skip)]
    indexes: Indexes,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON snapshot file. A missing file yields an
    /// empty store; a present but unreadable one is fatal.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut store: MemoryStore =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        store.reindex();
        Ok(store)
    }

    /// Write the store to a JSON snapshot file.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn organization_count(&self) -> usize {
        self.organizations.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    fn alloc_id(&mut self) -> StoreId {
        self.next_id += 1;
        self.next_id
    }

    fn reindex(&mut self) {
        let mut indexes = Indexes::default();
        for row in &self.organizations {
            indexes
                .org_keys
                .insert((row.inn.clone(), row.kpp.clone()), row.id);
        }
        for row in &self.categories {
            indexes.category_keys.insert(row.kpgz.clone(), row.id);
        }
        for row in &self.attributes {
            indexes.attribute_keys.insert(row.name.clone(), row.id);
        }
        for row in &self.values {
            indexes
                .value_keys
                .insert((row.attribute_id, row.name.clone()), row.id);
        }
        for row in &self.products {
            indexes.product_external.insert(row.external_id, row.id);
            indexes.product_ids.insert(row.id);
        }
        for row in &self.properties {
            indexes
                .property_keys
                .insert((row.product_id, row.attribute_id, row.value_id));
        }
        self.indexes = indexes;
    }

    // ------------------------------------------------------------------
    // Identity-entity persistence (idempotent per handle)
    // ------------------------------------------------------------------

    fn persist_org(&mut self, handle: OrgId, ids: &mut IdentityMap) -> StoreId {
        if let Some(id) = ids.org(handle).store_id {
            return id;
        }
        let id = self.alloc_id();
        let org = ids.org_mut(handle);
        org.store_id = Some(id);
        let row = OrganizationRow {
            id,
            name: org.name.clone(),
            inn: org.inn.clone(),
            kpp: org.kpp.clone(),
        };
        self.indexes
            .org_keys
            .insert((row.inn.clone(), row.kpp.clone()), id);
        self.organizations.push(row);
        id
    }

    fn persist_category(&mut self, handle: CategoryId, ids: &mut IdentityMap) -> StoreId {
        if let Some(id) = ids.category(handle).store_id {
            return id;
        }
        let id = self.alloc_id();
        let category = ids.category_mut(handle);
        category.store_id = Some(id);
        let row = CategoryRow {
            id,
            title: category.title.clone(),
            kpgz: category.kpgz.clone(),
        };
        self.indexes.category_keys.insert(row.kpgz.clone(), id);
        self.categories.push(row);
        id
    }

    fn persist_attribute(&mut self, handle: AttributeId, ids: &mut IdentityMap) -> StoreId {
        if let Some(id) = ids.attribute(handle).store_id {
            return id;
        }
        let id = self.alloc_id();
        let attribute = ids.attribute_mut(handle);
        attribute.store_id = Some(id);
        let row = AttributeRow {
            id,
            name: attribute.name.clone(),
        };
        self.indexes.attribute_keys.insert(row.name.clone(), id);
        self.attributes.push(row);
        id
    }

    fn persist_value(
        &mut self,
        handle: ValueId,
        attribute_id: StoreId,
        ids: &mut IdentityMap,
    ) -> StoreId {
        if let Some(id) = ids.value(handle).store_id {
            return id;
        }
        let id = self.alloc_id();
        let value = ids.value_mut(handle);
        value.store_id = Some(id);
        let row = ValueRow {
            id,
            attribute_id,
            name: value.name.clone(),
        };
        self.indexes
            .value_keys
            .insert((attribute_id, row.name.clone()), id);
        self.values.push(row);
        id
    }
}

impl Store for MemoryStore {
    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let attribute_names: HashMap<StoreId, &str> = self
            .attributes
            .iter()
            .map(|a| (a.id, a.name.as_str()))
            .collect();

        let mut snapshot = Snapshot::default();
        for row in &self.organizations {
            snapshot.organizations.push(SnapshotOrganization {
                id: row.id,
                name: row.name.clone(),
                inn: row.inn.clone(),
                kpp: row.kpp.clone(),
            });
        }
        for row in &self.categories {
            snapshot.categories.push(SnapshotCategory {
                id: row.id,
                title: row.title.clone(),
                kpgz: row.kpgz.clone(),
            });
        }
        for row in &self.attributes {
            snapshot.attributes.push(SnapshotAttribute {
                id: row.id,
                name: row.name.clone(),
            });
        }
        for row in &self.values {
            let Some(attribute_name) = attribute_names.get(&row.attribute_id) else {
                return Err(StoreError::MissingReference {
                    entity: "attribute",
                    key: row.attribute_id.to_string(),
                });
            };
            snapshot.values.push(SnapshotValue {
                id: row.id,
                attribute_name: attribute_name.to_string(),
                name: row.name.clone(),
            });
        }
        for row in &self.products {
            snapshot.products.push(SnapshotProduct {
                id: row.id,
                external_id: row.external_id,
            });
        }
        Ok(snapshot)
    }

    fn save_contracts(
        &mut self,
        batch: &[Contract],
        ids: &mut IdentityMap,
    ) -> Result<(), StoreError> {
        // Phase 1: validate against committed state. Two new organizations
        // with the same key share one handle by identity-map construction,
        // so only collisions with existing rows are possible.
        for contract in batch {
            for handle in [contract.customer, contract.provider] {
                let org = ids.org(handle);
                if org.store_id.is_none()
                    && self
                        .indexes
                        .org_keys
                        .contains_key(&(org.inn.clone(), org.kpp.clone()))
                {
                    return Err(StoreError::UniqueViolation {
                        entity: "organization",
                        key: format!("{}_{}", org.inn, org.kpp),
                    });
                }
            }
            for order in &contract.orders {
                if !self.indexes.product_ids.contains(&order.product) {
                    return Err(StoreError::MissingReference {
                        entity: "product",
                        key: order.product.to_string(),
                    });
                }
            }
        }

        // Phase 2: apply. Cannot fail after phase 1 passed.
        for contract in batch {
            let customer_id = self.persist_org(contract.customer, ids);
            let provider_id = self.persist_org(contract.provider, ids);
            let contract_id = self.alloc_id();
            self.contracts.push(ContractRow {
                id: contract_id,
                number: contract.number.clone(),
                public_at: contract.public_at,
                conclusion_at: contract.conclusion_at,
                price: contract.price,
                customer_id,
                provider_id,
            });
            for order in &contract.orders {
                let order_id = self.alloc_id();
                self.orders.push(OrderRow {
                    id: order_id,
                    contract_id,
                    product_id: order.product,
                    quantity: order.quantity,
                    amount: order.amount,
                });
            }
        }
        tracing::debug!(contracts = batch.len(), "batch applied");
        Ok(())
    }

    fn save_products(
        &mut self,
        batch: &[Product],
        ids: &mut IdentityMap,
    ) -> Result<(), StoreError> {
        // Phase 1: validate against committed state plus ids staged within
        // this batch.
        let mut staged_external = HashSet::new();
        for product in batch {
            if self.indexes.product_external.contains_key(&product.external_id)
                || !staged_external.insert(product.external_id)
            {
                return Err(StoreError::UniqueViolation {
                    entity: "product",
                    key: product.external_id.to_string(),
                });
            }
            let category = ids.category(product.category);
            if category.store_id.is_none()
                && self.indexes.category_keys.contains_key(&category.kpgz)
            {
                return Err(StoreError::UniqueViolation {
                    entity: "category",
                    key: category.kpgz.clone(),
                });
            }
            for property in &product.properties {
                let attribute = ids.attribute(property.attribute);
                if attribute.store_id.is_none()
                    && self.indexes.attribute_keys.contains_key(&attribute.name)
                {
                    return Err(StoreError::UniqueViolation {
                        entity: "attribute",
                        key: attribute.name.clone(),
                    });
                }
                if let Some(attribute_id) = attribute.store_id {
                    let value = ids.value(property.value);
                    if value.store_id.is_none()
                        && self
                            .indexes
                            .value_keys
                            .contains_key(&(attribute_id, value.name.clone()))
                    {
                        return Err(StoreError::UniqueViolation {
                            entity: "value",
                            key: format!("{}_{}", attribute.name, value.name),
                        });
                    }
                }
            }
        }

        // Phase 2: apply.
        for product in batch {
            let category_id = self.persist_category(product.category, ids);
            let product_id = self.alloc_id();
            self.products.push(ProductRow {
                id: product_id,
                external_id: product.external_id,
                name: product.name.clone(),
                category_id,
            });
            self.indexes
                .product_external
                .insert(product.external_id, product_id);
            self.indexes.product_ids.insert(product_id);
            ids.register_product(product.external_id, product_id);

            for property in &product.properties {
                let attribute_id = self.persist_attribute(property.attribute, ids);
                let value_id = self.persist_value(property.value, attribute_id, ids);
                let triple = (product_id, attribute_id, value_id);
                if self.indexes.property_keys.insert(triple) {
                    self.properties.push(PropertyRow {
                        product_id,
                        attribute_id,
                        value_id,
                    });
                }
            }
        }
        tracing::debug!(products = batch.len(), "batch applied");
        Ok(())
    }
}
