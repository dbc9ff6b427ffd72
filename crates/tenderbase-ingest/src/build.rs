//! Graph building: pure assembly of aggregates from resolved records.
//!
//! No validation, no identity-map access. The only derivation is the flat
//! distinct attribute/value lists on products, which the schema stores
//! alongside the property rows.

use tenderbase_model::{Contract, Product};

use crate::resolve::{ResolvedContract, ResolvedProduct};

pub fn build_contract(resolved: ResolvedContract) -> Contract {
    Contract {
        number: resolved.number,
        public_at: resolved.public_at,
        conclusion_at: resolved.conclusion_at,
        price: resolved.price,
        customer: resolved.customer,
        provider: resolved.provider,
        orders: resolved.orders,
    }
}

pub fn build_product(resolved: ResolvedProduct) -> Product {
    let mut attributes = Vec::new();
    let mut values = Vec::new();
    for property in &resolved.properties {
        if !attributes.contains(&property.attribute) {
            attributes.push(property.attribute);
        }
        if !values.contains(&property.value) {
            values.push(property.value);
        }
    }
    Product {
        external_id: resolved.external_id,
        name: resolved.name,
        category: resolved.category,
        properties: resolved.properties,
        attributes,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenderbase_model::{IdentityMap, ProductAttribute, ProductProperty, ProductValue};

    #[test]
    fn derived_lists_are_distinct_and_ordered() {
        let mut ids = IdentityMap::new();
        let color = ids.resolve_attribute("Цвет".to_string(), || ProductAttribute {
            store_id: None,
            name: "Цвет".to_string(),
        });
        let length = ids.resolve_attribute("Длина".to_string(), || ProductAttribute {
            store_id: None,
            name: "Длина".to_string(),
        });
        let white = ids.resolve_value(color, "белый".to_string(), || ProductValue {
            store_id: None,
            name: "белый".to_string(),
        });
        let five = ids.resolve_value(length, "5 м".to_string(), || ProductValue {
            store_id: None,
            name: "5 м".to_string(),
        });
        let category = ids.resolve_category("19.07".to_string(), || {
            tenderbase_model::Category {
                store_id: None,
                title: "Кабель".to_string(),
                kpgz: "19.07".to_string(),
            }
        });

        let product = build_product(ResolvedProduct {
            external_id: 1,
            name: "Кабель".to_string(),
            category,
            properties: vec![
                ProductProperty {
                    attribute: color,
                    value: white,
                },
                ProductProperty {
                    attribute: length,
                    value: five,
                },
                ProductProperty {
                    attribute: color,
                    value: five,
                },
            ],
        });

        assert_eq!(product.attributes, vec![color, length]);
        assert_eq!(product.values, vec![white, five]);
        assert_eq!(product.properties.len(), 3);
    }
}
