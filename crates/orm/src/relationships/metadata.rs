//! Relationship Metadata - static definitions of the catalogue's relations

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Defines the type of relationship between tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// One-to-many: the child table holds the foreign key
    HasMany,
    /// Many-to-one: the parent table holds the foreign key
    BelongsTo,
    /// Many-to-many through a pivot table
    ManyToMany,
}

impl RelationKind {
    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Pivot table of a many-to-many relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotDef {
    pub table: &'static str,
    /// Pivot column referencing the parent
    pub near_key: &'static str,
    /// Pivot column referencing the far-side entity
    pub far_key: &'static str,
}

/// A navigable relation from one table to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: RelationKind,
    pub parent_table: &'static str,
    pub child_table: &'static str,
    /// `HasMany`: child column referencing the parent id.
    /// `BelongsTo`: parent column referencing the child id.
    /// `ManyToMany`: unused, see `pivot`.
    pub foreign_key: &'static str,
    pub pivot: Option<PivotDef>,
}

impl RelationDef {
    /// Column of the parent row whose values form the key set
    pub fn parent_key_column(&self) -> &'static str {
        match self.kind {
            RelationKind::BelongsTo => self.foreign_key,
            RelationKind::HasMany | RelationKind::ManyToMany => "id",
        }
    }

    /// `parent_table.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.parent_table, self.name)
    }

    /// The pivot, required for many-to-many relations
    pub fn pivot(&self) -> ModelResult<&PivotDef> {
        self.pivot.as_ref().ok_or_else(|| {
            ModelError::Configuration(format!(
                "Many-to-many relation '{}' has no pivot table",
                self.qualified_name()
            ))
        })
    }
}

pub const STUDIO_PRODUCTS: RelationDef = RelationDef {
    name: "products",
    kind: RelationKind::HasMany,
    parent_table: "studios",
    child_table: "products",
    foreign_key: "studio_id",
    pivot: None,
};

pub const GROUP_PRODUCTS: RelationDef = RelationDef {
    name: "products",
    kind: RelationKind::HasMany,
    parent_table: "product_groups",
    child_table: "products",
    foreign_key: "group_id",
    pivot: None,
};

pub const PRODUCT_PRICES: RelationDef = RelationDef {
    name: "prices",
    kind: RelationKind::HasMany,
    parent_table: "products",
    child_table: "prices",
    foreign_key: "product_id",
    pivot: None,
};

pub const PRODUCT_SELLERS: RelationDef = RelationDef {
    name: "sellers",
    kind: RelationKind::ManyToMany,
    parent_table: "products",
    child_table: "sellers",
    foreign_key: "",
    pivot: Some(PivotDef {
        table: "seller_products",
        near_key: "product_id",
        far_key: "seller_id",
    }),
};

pub const PRODUCT_STUDIO: RelationDef = RelationDef {
    name: "studio",
    kind: RelationKind::BelongsTo,
    parent_table: "products",
    child_table: "studios",
    foreign_key: "studio_id",
    pivot: None,
};

pub const SELLER_PRODUCTS: RelationDef = RelationDef {
    name: "products",
    kind: RelationKind::ManyToMany,
    parent_table: "sellers",
    child_table: "products",
    foreign_key: "",
    pivot: Some(PivotDef {
        table: "seller_products",
        near_key: "seller_id",
        far_key: "product_id",
    }),
};

/// Every relation of the catalogue
pub const RELATIONS: &[RelationDef] = &[
    STUDIO_PRODUCTS,
    GROUP_PRODUCTS,
    PRODUCT_PRICES,
    PRODUCT_SELLERS,
    PRODUCT_STUDIO,
    SELLER_PRODUCTS,
];

/// Look up the relation `name` declared on `parent_table`
pub fn find_relation(parent_table: &str, name: &str) -> ModelResult<&'static RelationDef> {
    RELATIONS
        .iter()
        .find(|r| r.parent_table == parent_table && r.name == name)
        .ok_or_else(|| {
            ModelError::Query(format!(
                "Table '{}' has no relation named '{}'",
                parent_table, name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::table_schema;

    #[test]
    fn test_relations_reference_declared_columns() {
        for relation in RELATIONS {
            let parent = table_schema(relation.parent_table).unwrap();
            let child = table_schema(relation.child_table).unwrap();
            match relation.kind {
                RelationKind::HasMany => assert!(child.column(relation.foreign_key).is_some()),
                RelationKind::BelongsTo => assert!(parent.column(relation.foreign_key).is_some()),
                RelationKind::ManyToMany => {
                    let pivot = relation.pivot().unwrap();
                    let table = table_schema(pivot.table).unwrap();
                    assert!(table.column(pivot.near_key).is_some());
                    assert!(table.column(pivot.far_key).is_some());
                }
            }
        }
    }

    #[test]
    fn test_find_relation() {
        let relation = find_relation("products", "sellers").unwrap();
        assert!(relation.kind.requires_pivot());
        assert_eq!(relation.parent_key_column(), "id");
        assert_eq!(find_relation("products", "studio").unwrap().parent_key_column(), "studio_id");
        assert!(find_relation("prices", "sellers").is_err());
    }
}
