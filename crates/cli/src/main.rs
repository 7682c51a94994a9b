mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand};
use splitload_orm::StoreBackendType;

use crate::commands::demo::Demo;
use crate::config::AppConfig;
use crate::logging::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "splitload")]
#[command(about = "Compare graph-loading strategies over a seeded studio catalogue")]
struct Cli {
    /// Store to load from (memory or postgres)
    #[arg(long, global = true)]
    store: Option<StoreBackendType>,

    /// PostgreSQL connection string
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Largest key set sent in one batched lookup
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Load sibling relations concurrently
    #[arg(long, global = true)]
    parallel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one loading demo
    Demo {
        #[arg(value_enum)]
        name: Demo,

        /// Print the loaded graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the studio graph with every strategy and compare the cost
    Compare,

    /// Create the catalogue schema in PostgreSQL and insert the fixture
    Seed {
        /// Number of products to generate
        #[arg(long, default_value = "100")]
        products: usize,

        /// Prices per product
        #[arg(long, default_value = "10")]
        prices_per_product: usize,

        /// Allow seeding in production
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Command-line flags override the environment
    fn apply(&self, config: &mut AppConfig) {
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.batch_size.is_some() {
            config.batch_size = self.batch_size;
        }
        if self.parallel {
            config.parallel_siblings = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    init_logging(&LoggingConfig::from_app_config(&config))?;
    tracing::debug!(environment = %config.environment, store = %config.store, "configuration loaded");

    match cli.command {
        Commands::Demo { name, json } => commands::demo::run(&config, name, json).await,
        Commands::Compare => commands::compare::run(&config).await,
        Commands::Seed {
            products,
            prices_per_product,
            force,
        } => commands::seed::run(&config, products, prices_per_product, force).await,
    }
}
