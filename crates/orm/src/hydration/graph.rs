//! Object graph arena
//!
//! Entities live in flat maps keyed by identifier. Relations are ordered id
//! lists keyed by include alias and parent id; back-references such as
//! product → studio are looked up on demand from the foreign key.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::backends::StoreRow;
use crate::error::ModelResult;
use crate::model::{EntityId, Model, Price, Product, ProductGroup, Seller, Studio};

/// One decoded entity of any catalogue table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum Entity {
    Studio(Studio),
    ProductGroup(ProductGroup),
    Product(Product),
    Price(Price),
    Seller(Seller),
}

impl Entity {
    /// Decode a row whose columns are qualified with `table`
    pub fn decode(table: &str, row: &StoreRow) -> ModelResult<Self> {
        Ok(match table {
            "studios" => Entity::Studio(Studio::from_row(row)?),
            "product_groups" => Entity::ProductGroup(ProductGroup::from_row(row)?),
            "products" => Entity::Product(Product::from_row(row)?),
            "prices" => Entity::Price(Price::from_row(row)?),
            "sellers" => Entity::Seller(Seller::from_row(row)?),
            other => {
                return Err(crate::error::ModelError::Query(format!(
                    "Table '{}' holds no loadable entity",
                    other
                )))
            }
        })
    }

    /// Whether rows of `table` decode to an `Entity`
    pub fn is_loadable(table: &str) -> bool {
        matches!(
            table,
            "studios" | "product_groups" | "products" | "prices" | "sellers"
        )
    }

    /// Value of a foreign-key column of this entity
    pub fn foreign_key(&self, column: &str) -> Option<EntityId> {
        match (self, column) {
            (Entity::Product(p), "studio_id") => Some(p.studio_id),
            (Entity::Product(p), "group_id") => Some(p.group_id),
            (Entity::Price(p), "product_id") => Some(p.product_id),
            _ => None,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::Studio(e) => e.id,
            Entity::ProductGroup(e) => e.id,
            Entity::Product(e) => e.id,
            Entity::Price(e) => e.id,
            Entity::Seller(e) => e.id,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Entity::Studio(_) => Studio::table_name(),
            Entity::ProductGroup(_) => ProductGroup::table_name(),
            Entity::Product(_) => Product::table_name(),
            Entity::Price(_) => Price::table_name(),
            Entity::Seller(_) => Seller::table_name(),
        }
    }
}

/// A fully recomposed graph, exclusively owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectGraph {
    pub(crate) root_table: String,
    pub(crate) roots: Vec<EntityId>,
    pub(crate) studios: BTreeMap<EntityId, Studio>,
    pub(crate) product_groups: BTreeMap<EntityId, ProductGroup>,
    pub(crate) products: BTreeMap<EntityId, Product>,
    pub(crate) prices: BTreeMap<EntityId, Price>,
    pub(crate) sellers: BTreeMap<EntityId, Seller>,
    /// alias → parent id → ordered child ids
    pub(crate) collections: BTreeMap<String, BTreeMap<EntityId, Vec<EntityId>>>,
}

impl ObjectGraph {
    pub(crate) fn new(root_table: &str) -> Self {
        Self {
            root_table: root_table.to_string(),
            ..Self::default()
        }
    }

    /// Store an entity in the arena. Loading the same row twice yields the
    /// same copy, so the first one is kept.
    pub(crate) fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        match entity {
            Entity::Studio(e) => {
                self.studios.entry(id).or_insert(e);
            }
            Entity::ProductGroup(e) => {
                self.product_groups.entry(id).or_insert(e);
            }
            Entity::Product(e) => {
                self.products.entry(id).or_insert(e);
            }
            Entity::Price(e) => {
                self.prices.entry(id).or_insert(e);
            }
            Entity::Seller(e) => {
                self.sellers.entry(id).or_insert(e);
            }
        }
        id
    }

    pub fn root_table(&self) -> &str {
        &self.root_table
    }

    /// Root ids in the order the root query returned them
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Root studios in query order
    pub fn studios(&self) -> Vec<&Studio> {
        self.roots.iter().filter_map(|id| self.studios.get(id)).collect()
    }

    pub fn studio(&self, id: EntityId) -> Option<&Studio> {
        self.studios.get(&id)
    }

    pub fn product(&self, id: EntityId) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn price(&self, id: EntityId) -> Option<&Price> {
        self.prices.get(&id)
    }

    pub fn seller(&self, id: EntityId) -> Option<&Seller> {
        self.sellers.get(&id)
    }

    /// Child ids of `parent` under `alias`; `None` when the relation was not
    /// loaded for that parent
    pub fn children(&self, alias: &str, parent: EntityId) -> Option<&[EntityId]> {
        self.collections
            .get(alias)
            .and_then(|c| c.get(&parent))
            .map(Vec::as_slice)
    }

    /// Products included under `alias` for a studio or product group
    pub fn products_in(&self, alias: &str, parent: EntityId) -> Vec<&Product> {
        self.resolve(alias, parent, &self.products)
    }

    pub fn products_of(&self, studio: EntityId) -> Vec<&Product> {
        self.products_in("products", studio)
    }

    pub fn prices_of(&self, product: EntityId) -> Vec<&Price> {
        self.resolve("prices", product, &self.prices)
    }

    pub fn sellers_of(&self, product: EntityId) -> Vec<&Seller> {
        self.resolve("sellers", product, &self.sellers)
    }

    /// Owning studio of a product, if it was loaded
    pub fn studio_of(&self, product: &Product) -> Option<&Studio> {
        self.studios.get(&product.studio_id)
    }

    /// Number of distinct entities of `table` in the arena
    pub fn count(&self, table: &str) -> usize {
        match table {
            "studios" => self.studios.len(),
            "product_groups" => self.product_groups.len(),
            "products" => self.products.len(),
            "prices" => self.prices.len(),
            "sellers" => self.sellers.len(),
            _ => 0,
        }
    }

    /// Aliases of every loaded collection
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Parent id → set of child ids for one alias
    pub fn membership(&self, alias: &str) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
        self.collections
            .get(alias)
            .map(|c| {
                c.iter()
                    .map(|(parent, children)| (*parent, children.iter().copied().collect()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when both graphs hold the same roots and the same parent/child
    /// sets for every alias, regardless of order
    pub fn same_membership(&self, other: &ObjectGraph) -> bool {
        let roots: BTreeSet<_> = self.roots.iter().collect();
        let other_roots: BTreeSet<_> = other.roots.iter().collect();
        roots == other_roots
            && self.collections.keys().eq(other.collections.keys())
            && self
                .collections
                .keys()
                .all(|alias| self.membership(alias) == other.membership(alias))
    }

    fn resolve<'a, T>(
        &'a self,
        alias: &str,
        parent: EntityId,
        arena: &'a BTreeMap<EntityId, T>,
    ) -> Vec<&'a T> {
        self.children(alias, parent)
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| arena.get(id))
            .collect()
    }
}
