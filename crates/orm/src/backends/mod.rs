//! Store Backends
//!
//! The `RelationalStore` abstraction and its two adapters: an in-memory engine
//! used by tests and the demo CLI, and PostgreSQL through sqlx.

pub mod core;
pub mod memory;
pub mod postgres;

// Re-export core traits and types
pub use self::core::*;
pub use memory::{InMemoryStore, StoreStats};
pub use postgres::PostgresStore;

/// Store backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackendType {
    Memory,
    PostgreSQL,
}

impl std::fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendType::Memory => write!(f, "memory"),
            StoreBackendType::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

impl std::str::FromStr for StoreBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackendType::Memory),
            "postgresql" | "postgres" => Ok(StoreBackendType::PostgreSQL),
            _ => Err(format!("Unsupported store backend: {}", s)),
        }
    }
}
