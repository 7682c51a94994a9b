//! Subcommands of the splitload binary

pub mod compare;
pub mod demo;
pub mod seed;

use anyhow::Context;
use splitload_orm::{
    InMemoryStore, LoadStats, PoolConfig, PostgresStore, RelationalStore, SeedConfig, SeedData,
    StoreBackendType,
};

use crate::config::AppConfig;

/// The store a command loads from
pub enum Backend {
    Memory(InMemoryStore),
    Postgres(PostgresStore),
}

impl Backend {
    /// Open the configured store. The in-memory store is seeded with the
    /// default fixture; a PostgreSQL store is expected to be seeded already.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        match config.store {
            StoreBackendType::Memory => {
                let store = SeedData::generate(&SeedConfig::default())?.into_memory_store()?;
                Ok(Backend::Memory(store))
            }
            StoreBackendType::PostgreSQL => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres store")?;
                let store = PostgresStore::connect(url, &PoolConfig::default())
                    .await
                    .context("Failed to connect to database")?;
                Ok(Backend::Postgres(store))
            }
        }
    }

    pub fn store(&self) -> &dyn RelationalStore {
        match self {
            Backend::Memory(store) => store,
            Backend::Postgres(store) => store,
        }
    }

    pub async fn close(self) {
        if let Backend::Postgres(store) = self {
            store.close().await;
        }
    }
}

pub fn print_stats_header() {
    println!(
        "{:<14} {:>8} {:>8} {:>6} {:>8}",
        "strategy", "queries", "rows", "depth", "ms"
    );
}

pub fn print_stats(stats: &LoadStats) {
    println!(
        "{:<14} {:>8} {:>8} {:>6} {:>8}",
        stats.strategy.to_string(),
        stats.query_count,
        stats.rows_fetched,
        stats.depth_loaded,
        stats.execution_time_ms
    );
}
