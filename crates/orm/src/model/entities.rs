//! Catalogue entities: studios, product groups, products, prices, sellers and
//! the product/seller association.
//!
//! Entities carry foreign keys as plain identifiers. Navigation happens through
//! `ObjectGraph`, never through embedded references.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::core_trait::{ColumnDef, EntityId, ForeignKeyDef, Model, TableSchema};
use crate::backends::{StoreRow, StoreValue, ValueKind};
use crate::error::ModelResult;

pub const STUDIOS: TableSchema = TableSchema {
    name: "studios",
    columns: &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::required("name", ValueKind::Text),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
};

pub const PRODUCT_GROUPS: TableSchema = TableSchema {
    name: "product_groups",
    columns: &[ColumnDef::required("id", ValueKind::Integer)],
    primary_key: &["id"],
    foreign_keys: &[],
};

pub const PRODUCTS: TableSchema = TableSchema {
    name: "products",
    columns: &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::required("name", ValueKind::Text),
        ColumnDef::required("deliverable_from", ValueKind::Date),
        ColumnDef::required("deliverable_until", ValueKind::Date),
        ColumnDef::required("studio_id", ValueKind::Integer),
        ColumnDef::required("group_id", ValueKind::Integer),
    ],
    primary_key: &["id"],
    foreign_keys: &[
        ForeignKeyDef {
            column: "studio_id",
            references: "studios",
        },
        ForeignKeyDef {
            column: "group_id",
            references: "product_groups",
        },
    ],
};

pub const PRICES: TableSchema = TableSchema {
    name: "prices",
    columns: &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::required("product_id", ValueKind::Integer),
        ColumnDef::required("value", ValueKind::Decimal),
    ],
    primary_key: &["id"],
    foreign_keys: &[ForeignKeyDef {
        column: "product_id",
        references: "products",
    }],
};

pub const SELLERS: TableSchema = TableSchema {
    name: "sellers",
    columns: &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::required("name", ValueKind::Text),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
};

pub const SELLER_PRODUCTS: TableSchema = TableSchema {
    name: "seller_products",
    columns: &[
        ColumnDef::required("product_id", ValueKind::Integer),
        ColumnDef::required("seller_id", ValueKind::Integer),
    ],
    primary_key: &["product_id", "seller_id"],
    foreign_keys: &[
        ForeignKeyDef {
            column: "product_id",
            references: "products",
        },
        ForeignKeyDef {
            column: "seller_id",
            references: "sellers",
        },
    ],
};

/// Every table of the catalogue, parents before children
pub const CATALOG: &[TableSchema] = &[
    STUDIOS,
    PRODUCT_GROUPS,
    PRODUCTS,
    PRICES,
    SELLERS,
    SELLER_PRODUCTS,
];

/// Look up a catalogue table by name
pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    CATALOG.iter().find(|t| t.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Studio {
    pub id: EntityId,
    pub name: String,
}

impl Model for Studio {
    fn schema() -> &'static TableSchema {
        &STUDIOS
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        Ok(Self {
            id: row.get_i32("studios", "id")?,
            name: row.get_text("studios", "name")?,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![self.id.into(), self.name.clone().into()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: EntityId,
}

impl Model for ProductGroup {
    fn schema() -> &'static TableSchema {
        &PRODUCT_GROUPS
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        Ok(Self {
            id: row.get_i32("product_groups", "id")?,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![self.id.into()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    pub deliverable_from: NaiveDate,
    pub deliverable_until: NaiveDate,
    pub studio_id: EntityId,
    pub group_id: EntityId,
}

impl Product {
    /// Whether `date` falls inside the delivery window (inclusive). An
    /// inverted window simply matches nothing.
    pub fn is_deliverable_on(&self, date: NaiveDate) -> bool {
        self.deliverable_from <= date && date <= self.deliverable_until
    }
}

impl Model for Product {
    fn schema() -> &'static TableSchema {
        &PRODUCTS
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        Ok(Self {
            id: row.get_i32("products", "id")?,
            name: row.get_text("products", "name")?,
            deliverable_from: row.get_date("products", "deliverable_from")?,
            deliverable_until: row.get_date("products", "deliverable_until")?,
            studio_id: row.get_i32("products", "studio_id")?,
            group_id: row.get_i32("products", "group_id")?,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![
            self.id.into(),
            self.name.clone().into(),
            self.deliverable_from.into(),
            self.deliverable_until.into(),
            self.studio_id.into(),
            self.group_id.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: EntityId,
    pub product_id: EntityId,
    /// Two fractional digits
    pub value: Decimal,
}

impl Model for Price {
    fn schema() -> &'static TableSchema {
        &PRICES
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        let mut value = row.get_decimal("prices", "value")?;
        value.rescale(2);
        Ok(Self {
            id: row.get_i32("prices", "id")?,
            product_id: row.get_i32("prices", "product_id")?,
            value,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![self.id.into(), self.product_id.into(), self.value.into()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: EntityId,
    pub name: String,
}

impl Model for Seller {
    fn schema() -> &'static TableSchema {
        &SELLERS
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        Ok(Self {
            id: row.get_i32("sellers", "id")?,
            name: row.get_text("sellers", "name")?,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![self.id.into(), self.name.clone().into()]
    }
}

/// Association row resolving the product/seller many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerProduct {
    pub product_id: EntityId,
    pub seller_id: EntityId,
}

impl Model for SellerProduct {
    fn schema() -> &'static TableSchema {
        &SELLER_PRODUCTS
    }

    fn id(&self) -> Option<EntityId> {
        None
    }

    fn from_row(row: &StoreRow) -> ModelResult<Self> {
        Ok(Self {
            product_id: row.get_i32("seller_products", "product_id")?,
            seller_id: row.get_i32("seller_products", "seller_id")?,
        })
    }

    fn to_values(&self) -> Vec<StoreValue> {
        vec![self.product_id.into(), self.seller_id.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_round_trips_through_row() {
        let product = Product {
            id: 7,
            name: "Endgame".into(),
            deliverable_from: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            deliverable_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            studio_id: 3,
            group_id: 4,
        };
        let mut row = StoreRow::new();
        for (column, value) in Product::columns().into_iter().zip(product.to_values()) {
            row = row.with("products", column, value);
        }
        assert_eq!(Product::from_row(&row).unwrap(), product);
    }

    #[test]
    fn test_price_value_has_two_fraction_digits() {
        let row = StoreRow::new()
            .with("prices", "id", 1)
            .with("prices", "product_id", 1)
            .with("prices", "value", 42);
        let price = Price::from_row(&row).unwrap();
        assert_eq!(price.value.to_string(), "42.00");
    }

    #[test]
    fn test_deliverable_window_is_inclusive() {
        let from = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let until = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let product = Product {
            id: 1,
            name: "Infinity".into(),
            deliverable_from: from,
            deliverable_until: until,
            studio_id: 1,
            group_id: 1,
        };
        assert!(product.is_deliverable_on(from));
        assert!(product.is_deliverable_on(until));
        assert!(!product.is_deliverable_on(NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()));
    }

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(table_schema("prices").unwrap().primary_key, &["id"]);
        assert!(table_schema("users").is_none());
    }
}
