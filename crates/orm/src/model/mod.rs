//! Model System - entity definitions and the trait they share
//!
//! - `core_trait`: the `Model` trait and static table schemas
//! - `entities`: the studio catalogue (studios, product groups, products,
//!   prices, sellers, seller/product association)

pub mod core_trait;
pub mod entities;

pub use core_trait::{ColumnDef, EntityId, ForeignKeyDef, Model, TableSchema};
pub use entities::{
    table_schema, Price, Product, ProductGroup, Seller, SellerProduct, Studio, CATALOG,
};
