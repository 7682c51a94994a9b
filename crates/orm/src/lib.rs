//! # splitload-orm: graph loading for relational stores
//!
//! Loads an object graph (studios → products → prices and sellers) from a
//! relational store with one of three strategies: a single LEFT JOIN query,
//! split queries with batched lookups, or one query per parent row.
//!
//! Filters are checked by the translation guard before anything is sent to
//! the store, and the fetched result sets are recomposed into an in-memory
//! `ObjectGraph` owned by the caller.

pub mod backends;
pub mod conditions;
pub mod database;
pub mod error;
pub mod hydration;
pub mod loading;
pub mod model;
pub mod query;
pub mod relationships;
pub mod seeding;

// Re-export core traits and types
pub use backends::{
    ColumnRef, InMemoryStore, PostgresStore, RelationalStore, StoreBackendType, StoreQuery,
    StoreRow, StoreStats, StoreValue,
};
pub use conditions::{Predicate, StorePredicate, TranslationGuard};
pub use database::{create_pool, PoolConfig, PoolError};
pub use error::*;
pub use hydration::{Entity, GraphRecomposer, ObjectGraph};
pub use loading::{
    BatchConfig, BatchLoader, GraphLoader, Include, LoadOutcome, LoadRequest, LoadStats,
    LoadStrategy,
};
pub use model::*;
pub use query::{OrderBy, OrderDirection, QueryOperator};
pub use relationships::{RelationDef, RelationKind};
pub use seeding::{PostgresSeeder, SeedConfig, SeedData};
