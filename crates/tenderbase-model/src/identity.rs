//! Run-scoped identity map.
//!
//! One map instance lives for exactly one ingestion run. It is pre-seeded
//! from the store snapshot at startup and then consulted/grown by the
//! resolve step, so that every natural key resolves to the same in-memory
//! entity whether it was loaded from the store or minted earlier in the
//! same run. This is the core deduplication invariant: without it, repeats
//! of the same organization/category/attribute in the source file would
//! produce duplicate rows that violate the natural-key constraints at
//! commit time.

use std::collections::{HashMap, HashSet};

use crate::entities::{
    AttributeId, Category, CategoryId, OrgId, OrgKey, Organization, ProductAttribute, ProductValue,
    StoreId, ValueId,
};
use crate::snapshot::Snapshot;

/// External property ids that are canonicalized to the attribute name
/// "Длина" regardless of the literal name in the source. Known upstream
/// data-quality quirk: the same physical attribute ships under two ids
/// with inconsistent spellings.
const LENGTH_ATTRIBUTE_IDS: [i64; 2] = [284_858_006, 284_858_014];

/// Remap quirky external attribute ids to their canonical name. Must be
/// applied before the attribute-name lookup, not after.
pub fn canonical_attribute_name(external_id: i64, name: &str) -> &str {
    if LENGTH_ATTRIBUTE_IDS.contains(&external_id) {
        "Длина"
    } else {
        name
    }
}

/// Per-run dictionaries keyed by natural/composite business keys, plus the
/// arenas that own the entities the handles point into.
#[derive(Debug, Default)]
pub struct IdentityMap {
    orgs: Vec<Organization>,
    org_index: HashMap<OrgKey, OrgId>,

    categories: Vec<Category>,
    category_index: HashMap<String, CategoryId>,

    attributes: Vec<ProductAttribute>,
    attribute_index: HashMap<String, AttributeId>,

    values: Vec<ProductValue>,
    value_index: HashMap<(AttributeId, String), ValueId>,

    /// ExternalId -> durable product id, for order line references.
    product_ids: HashMap<i64, StoreId>,
    /// Every ExternalId known this run: pre-seeded plus discovered in-run.
    seen_products: HashSet<i64>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the dictionaries from a store snapshot taken at startup.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut map = Self::new();

        for org in snapshot.organizations {
            let key = OrgKey {
                inn: org.inn.clone(),
                kpp: org.kpp.clone(),
            };
            map.resolve_org(key, || Organization {
                store_id: Some(org.id),
                name: org.name.clone(),
                inn: org.inn.clone(),
                kpp: org.kpp.clone(),
            });
        }
        for cat in snapshot.categories {
            map.resolve_category(cat.kpgz.clone(), || Category {
                store_id: Some(cat.id),
                title: cat.title.clone(),
                kpgz: cat.kpgz.clone(),
            });
        }
        for attr in snapshot.attributes {
            map.resolve_attribute(attr.name.clone(), || ProductAttribute {
                store_id: Some(attr.id),
                name: attr.name.clone(),
            });
        }
        for value in snapshot.values {
            let Some(&attribute) = map.attribute_index.get(&value.attribute_name) else {
                tracing::warn!(
                    attribute = %value.attribute_name,
                    value = %value.name,
                    "snapshot value references unknown attribute; ignored"
                );
                continue;
            };
            map.resolve_value(attribute, value.name.clone(), || ProductValue {
                store_id: Some(value.id),
                name: value.name.clone(),
            });
        }
        for product in snapshot.products {
            map.product_ids.insert(product.external_id, product.id);
            map.seen_products.insert(product.external_id);
        }

        map
    }

    // ------------------------------------------------------------------
    // Resolution: lookup-or-mint, at most one entity per key per run
    // ------------------------------------------------------------------

    pub fn resolve_org<F>(&mut self, key: OrgKey, new: F) -> OrgId
    where
        F: FnOnce() -> Organization,
    {
        if let Some(&id) = self.org_index.get(&key) {
            return id;
        }
        let id = OrgId(self.orgs.len() as u32);
        self.orgs.push(new());
        self.org_index.insert(key, id);
        id
    }

    pub fn resolve_category<F>(&mut self, kpgz: String, new: F) -> CategoryId
    where
        F: FnOnce() -> Category,
    {
        if let Some(&id) = self.category_index.get(&kpgz) {
            return id;
        }
        let id = CategoryId(self.categories.len() as u32);
        self.categories.push(new());
        self.category_index.insert(kpgz, id);
        id
    }

    pub fn resolve_attribute<F>(&mut self, name: String, new: F) -> AttributeId
    where
        F: FnOnce() -> ProductAttribute,
    {
        if let Some(&id) = self.attribute_index.get(&name) {
            return id;
        }
        let id = AttributeId(self.attributes.len() as u32);
        self.attributes.push(new());
        self.attribute_index.insert(name, id);
        id
    }

    /// Values are deduplicated per `(Attribute, Value)` pair, not by name
    /// alone.
    pub fn resolve_value<F>(&mut self, attribute: AttributeId, name: String, new: F) -> ValueId
    where
        F: FnOnce() -> ProductValue,
    {
        if let Some(&id) = self.value_index.get(&(attribute, name.clone())) {
            return id;
        }
        let id = ValueId(self.values.len() as u32);
        self.values.push(new());
        self.value_index.insert((attribute, name), id);
        id
    }

    // ------------------------------------------------------------------
    // Products: insert-only by ExternalId
    // ------------------------------------------------------------------

    /// Durable id of an already-persisted product, if any.
    pub fn product_store_id(&self, external_id: i64) -> Option<StoreId> {
        self.product_ids.get(&external_id).copied()
    }

    /// Claim an ExternalId for this run. Returns `false` if the id was
    /// already known (pre-seeded or claimed earlier in the run); the
    /// caller then skips the row.
    pub fn claim_product(&mut self, external_id: i64) -> bool {
        self.seen_products.insert(external_id)
    }

    /// Record the durable id of a product the store just inserted.
    pub fn register_product(&mut self, external_id: i64, store_id: StoreId) {
        self.product_ids.insert(external_id, store_id);
        self.seen_products.insert(external_id);
    }

    // ------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------

    pub fn org(&self, id: OrgId) -> &Organization {
        &self.orgs[id.0 as usize]
    }

    pub fn org_mut(&mut self, id: OrgId) -> &mut Organization {
        &mut self.orgs[id.0 as usize]
    }

    pub fn category(&self, id: CategoryId) -> &Category {
        &self.categories[id.0 as usize]
    }

    pub fn category_mut(&mut self, id: CategoryId) -> &mut Category {
        &mut self.categories[id.0 as usize]
    }

    pub fn attribute(&self, id: AttributeId) -> &ProductAttribute {
        &self.attributes[id.0 as usize]
    }

    pub fn attribute_mut(&mut self, id: AttributeId) -> &mut ProductAttribute {
        &mut self.attributes[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &ProductValue {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ProductValue {
        &mut self.values[id.0 as usize]
    }

    /// Lookup an organization handle without minting.
    pub fn find_org(&self, inn: &str, kpp: &str) -> Option<OrgId> {
        self.org_index
            .get(&OrgKey {
                inn: inn.to_string(),
                kpp: kpp.to_string(),
            })
            .copied()
    }

    /// Lookup a category handle without minting.
    pub fn find_category(&self, kpgz: &str) -> Option<CategoryId> {
        self.category_index.get(kpgz).copied()
    }

    /// Lookup an attribute handle without minting.
    pub fn find_attribute(&self, name: &str) -> Option<AttributeId> {
        self.attribute_index.get(name).copied()
    }

    /// Lookup a value handle without minting.
    pub fn find_value(&self, attribute: AttributeId, name: &str) -> Option<ValueId> {
        self.value_index
            .get(&(attribute, name.to_string()))
            .copied()
    }

    pub fn org_count(&self) -> usize {
        self.orgs.len()
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
}
