//! Query Module - operators, ordering and SQL rendering of store queries

pub mod sql_generation;
pub mod types;

pub use types::{JoinType, OrderBy, OrderDirection, QueryOperator};
