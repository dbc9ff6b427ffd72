//! Store snapshot consumed at startup to seed the identity map.
//!
//! The store reads every existing natural key in bulk once per run; the
//! pipeline never queries per row.

use crate::entities::StoreId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOrganization {
    pub id: StoreId,
    pub name: String,
    pub inn: String,
    pub kpp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCategory {
    pub id: StoreId,
    pub title: String,
    pub kpgz: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotAttribute {
    pub id: StoreId,
    pub name: String,
}

/// A value together with the attribute name it is paired with. The pairing
/// comes from the property rows; the value row itself carries only a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotValue {
    pub id: StoreId,
    pub attribute_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotProduct {
    pub id: StoreId,
    pub external_id: i64,
}

/// Bulk read of all existing natural keys, taken once before ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub organizations: Vec<SnapshotOrganization>,
    pub categories: Vec<SnapshotCategory>,
    pub attributes: Vec<SnapshotAttribute>,
    pub values: Vec<SnapshotValue>,
    pub products: Vec<SnapshotProduct>,
}
