//! Resolution of parsed records against the run's identity map.
//!
//! This is the one place that both reads and grows the identity
//! dictionaries. Parsing stays pure; building stays pure; everything
//! key-related happens here, visibly.

use std::collections::HashSet;

use tenderbase_model::{
    canonical_attribute_name, Category, CategoryId, IdentityMap, Order, OrgId, OrgKey,
    Organization, ProductAttribute, ProductProperty, ProductValue,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::contract::{ContractRecord, OrgFields};
use crate::error::SkipReason;
use crate::product::ProductRecord;

/// A contract record with every reference turned into an entity handle.
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    pub number: String,
    pub public_at: DateTime<Utc>,
    pub conclusion_at: Option<DateTime<Utc>>,
    pub price: Decimal,
    pub customer: OrgId,
    pub provider: OrgId,
    pub orders: Vec<Order>,
}

/// A product record with every reference turned into an entity handle.
#[derive(Debug, Clone)]
pub struct ResolvedProduct {
    pub external_id: i64,
    pub name: String,
    pub category: CategoryId,
    pub properties: Vec<ProductProperty>,
}

fn resolve_org(fields: &OrgFields, ids: &mut IdentityMap) -> OrgId {
    ids.resolve_org(
        OrgKey {
            inn: fields.inn.clone(),
            kpp: fields.kpp.clone(),
        },
        || Organization {
            store_id: None,
            name: fields.name.clone(),
            inn: fields.inn.clone(),
            kpp: fields.kpp.clone(),
        },
    )
}

/// Resolve a contract's organizations and order product references. An
/// order whose product is unknown is dropped; a contract left with no
/// orders is dropped whole.
pub fn resolve_contract(
    record: ContractRecord,
    ids: &mut IdentityMap,
) -> Result<ResolvedContract, SkipReason> {
    let customer = resolve_org(&record.customer, ids);
    let provider = resolve_org(&record.provider, ids);

    let mut orders = Vec::with_capacity(record.orders.len());
    for raw in &record.orders {
        let Some(product) = ids.product_store_id(raw.product_external_id) else {
            continue;
        };
        orders.push(Order {
            product,
            quantity: raw.quantity,
            amount: raw.amount,
        });
    }
    if orders.is_empty() {
        return Err(SkipReason::NoValidItems);
    }

    Ok(ResolvedContract {
        number: record.number,
        public_at: record.public_at,
        conclusion_at: record.conclusion_at,
        price: record.price,
        customer,
        provider,
        orders,
    })
}

/// Resolve a product's category and properties. Products are insert-only:
/// an ExternalId already known this run (pre-seeded or seen earlier in the
/// file) skips the row. Property pairs are deduplicated per product.
pub fn resolve_product(
    record: ProductRecord,
    ids: &mut IdentityMap,
) -> Result<ResolvedProduct, SkipReason> {
    if !ids.claim_product(record.external_id) {
        return Err(SkipReason::DuplicateProduct);
    }

    let category = ids.resolve_category(record.category_kpgz.clone(), || Category {
        store_id: None,
        title: record.category_title.clone(),
        kpgz: record.category_kpgz.clone(),
    });

    let mut properties = Vec::with_capacity(record.properties.len());
    let mut seen_pairs = HashSet::new();
    for raw in &record.properties {
        // The remap must precede the name lookup.
        let name = canonical_attribute_name(raw.external_id, &raw.name);
        let attribute = ids.resolve_attribute(name.to_string(), || ProductAttribute {
            store_id: None,
            name: name.to_string(),
        });
        let value = ids.resolve_value(attribute, raw.value.clone(), || ProductValue {
            store_id: None,
            name: raw.value.clone(),
        });
        if seen_pairs.insert((attribute, value)) {
            properties.push(ProductProperty { attribute, value });
        }
    }

    Ok(ResolvedProduct {
        external_id: record.external_id,
        name: record.name,
        category,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::RawProperty;

    fn product_record(external_id: i64, properties: Vec<RawProperty>) -> ProductRecord {
        ProductRecord {
            external_id,
            name: "Кабель силовой".to_string(),
            category_title: "Кабельная продукция".to_string(),
            category_kpgz: "19.07".to_string(),
            properties,
        }
    }

    fn property(id: i64, name: &str, value: &str) -> RawProperty {
        RawProperty {
            external_id: id,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn quirky_length_ids_share_one_attribute() {
        let mut ids = IdentityMap::new();
        let a = resolve_product(
            product_record(1, vec![property(284_858_006, "длинна", "5 м")]),
            &mut ids,
        )
        .unwrap();
        let b = resolve_product(
            product_record(2, vec![property(284_858_014, "Длина изделия", "5 м")]),
            &mut ids,
        )
        .unwrap();

        assert_eq!(ids.attribute_count(), 1);
        assert_eq!(a.properties[0].attribute, b.properties[0].attribute);
        assert_eq!(ids.attribute(a.properties[0].attribute).name, "Длина");
        // Same canonical attribute and same value literal: one value entity.
        assert_eq!(a.properties[0].value, b.properties[0].value);
    }

    #[test]
    fn duplicate_pairs_collapse_within_a_product() {
        let mut ids = IdentityMap::new();
        let resolved = resolve_product(
            product_record(
                1,
                vec![
                    property(1, "Цвет", "белый"),
                    property(2, "Цвет", "белый"),
                    property(3, "Цвет", "чёрный"),
                ],
            ),
            &mut ids,
        )
        .unwrap();
        assert_eq!(resolved.properties.len(), 2);
    }

    #[test]
    fn second_sighting_of_external_id_is_skipped() {
        let mut ids = IdentityMap::new();
        resolve_product(
            product_record(5, vec![property(1, "Цвет", "белый")]),
            &mut ids,
        )
        .unwrap();
        let err = resolve_product(
            product_record(5, vec![property(1, "Цвет", "белый")]),
            &mut ids,
        )
        .unwrap_err();
        assert_eq!(err, SkipReason::DuplicateProduct);
    }

    #[test]
    fn orders_with_unknown_products_are_dropped() {
        use crate::contract::RawOrder;
        use chrono::TimeZone;

        let mut ids = IdentityMap::new();
        ids.register_product(100, 1);

        let record = ContractRecord {
            number: "ГК-1".to_string(),
            public_at: Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap(),
            conclusion_at: None,
            price: Decimal::ONE,
            customer: OrgFields {
                inn: "1".to_string(),
                kpp: "2".to_string(),
                name: "c".to_string(),
            },
            provider: OrgFields {
                inn: "3".to_string(),
                kpp: "4".to_string(),
                name: "p".to_string(),
            },
            orders: vec![
                RawOrder {
                    product_external_id: 100,
                    quantity: Decimal::ONE,
                    amount: Decimal::ONE,
                },
                RawOrder {
                    product_external_id: 999,
                    quantity: Decimal::ONE,
                    amount: Decimal::ONE,
                },
            ],
        };

        let resolved = resolve_contract(record.clone(), &mut ids).unwrap();
        assert_eq!(resolved.orders.len(), 1);
        assert_eq!(resolved.orders[0].product, 1);

        // Only the unknown product left: the whole contract goes.
        let mut only_unknown = record;
        only_unknown.orders.remove(0);
        assert_eq!(
            resolve_contract(only_unknown, &mut ids).unwrap_err(),
            SkipReason::NoValidItems
        );
    }
}
