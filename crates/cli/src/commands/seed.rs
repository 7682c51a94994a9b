use anyhow::Context;
use splitload_orm::{PoolConfig, PostgresSeeder, PostgresStore, SeedConfig, SeedData};

use crate::config::AppConfig;

/// Create the catalogue tables in PostgreSQL and insert a fresh fixture
pub async fn run(
    config: &AppConfig,
    products: usize,
    prices_per_product: usize,
    force: bool,
) -> anyhow::Result<()> {
    if config.environment.is_production() && !force {
        anyhow::bail!("Refusing to drop and reseed tables in production without --force");
    }

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for seeding")?;

    let data = SeedData::generate(&SeedConfig {
        products,
        prices_per_product,
        ..SeedConfig::default()
    })?;

    let store = PostgresStore::connect(url, &PoolConfig::default())
        .await
        .context("Failed to connect to database")?;
    let seeded = PostgresSeeder::new(data).run(&store).await;
    store.close().await;
    seeded?;

    println!(
        "Seeded {} products with {} prices each",
        products, prices_per_product
    );
    Ok(())
}
