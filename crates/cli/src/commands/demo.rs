use clap::ValueEnum;
use splitload_orm::{
    GraphLoader, Include, LoadRequest, LoadStrategy, ObjectGraph, Predicate, RelationalStore,
};

use super::{print_stats, print_stats_header, Backend};
use crate::config::AppConfig;

/// The loading demos
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// Studios, products and prices with one query per parent row
    NPlusOne,
    /// Products, then all of their prices in one batched lookup
    BatchedPrices,
    /// Products joined with their prices in one query
    IncludePrices,
    /// Every studio with its products, split
    ProductsByStudio,
    /// The full studio graph as one joined query
    Cartesian,
    /// The full studio graph, split into one query per relation
    Split,
    /// Infinity and Endgame products per studio under separate aliases
    FilteredSplit,
    /// First product of every studio by id
    FirstProduct,
}

impl Demo {
    /// Request and strategy of the graph-loading demos
    pub fn plan(self) -> Option<(LoadRequest, LoadStrategy)> {
        let products_with_prices =
            || LoadRequest::new("products").include(Include::new("prices"));

        let plan = match self {
            Demo::NPlusOne => (
                LoadRequest::new("studios")
                    .include(Include::new("products").include(Include::new("prices"))),
                LoadStrategy::PerParent,
            ),
            Demo::BatchedPrices => (products_with_prices(), LoadStrategy::Split),
            Demo::IncludePrices => (products_with_prices(), LoadStrategy::SingleQuery),
            Demo::ProductsByStudio => (
                LoadRequest::new("studios").include(Include::new("products")),
                LoadStrategy::Split,
            ),
            Demo::Cartesian => (studio_graph(), LoadStrategy::SingleQuery),
            Demo::Split => (studio_graph(), LoadStrategy::Split),
            Demo::FilteredSplit => (
                LoadRequest::new("studios")
                    .include(
                        Include::new("products")
                            .alias("infinity")
                            .filter(Predicate::eq("products", "name", "Infinity"))
                            .include(Include::new("prices")),
                    )
                    .include(
                        Include::new("products")
                            .alias("endgame")
                            .filter(Predicate::eq("products", "name", "Endgame"))
                            .include(Include::new("prices")),
                    ),
                LoadStrategy::Split,
            ),
            Demo::FirstProduct => return None,
        };
        Some(plan)
    }
}

/// Studios with products, their prices and their sellers
pub fn studio_graph() -> LoadRequest {
    LoadRequest::new("studios").include(
        Include::new("products")
            .include(Include::new("prices"))
            .include(Include::new("sellers")),
    )
}

pub async fn run(config: &AppConfig, demo: Demo, json: bool) -> anyhow::Result<()> {
    let backend = Backend::open(config).await?;
    let loader = GraphLoader::with_config(config.batch_config())?;

    let result = match demo.plan() {
        Some((request, strategy)) => {
            load_and_print(&loader, backend.store(), &request, strategy, json).await
        }
        None => first_product(&loader, backend.store()).await,
    };

    backend.close().await;
    result
}

async fn load_and_print(
    loader: &GraphLoader,
    store: &dyn RelationalStore,
    request: &LoadRequest,
    strategy: LoadStrategy,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = loader.load(store, request, strategy).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    summarize(&outcome.graph, request);
    println!();
    print_stats_header();
    print_stats(&outcome.stats);
    Ok(())
}

/// One line per root: the size of every top-level collection
fn summarize(graph: &ObjectGraph, request: &LoadRequest) {
    for root in graph.roots() {
        let collections: Vec<String> = request
            .includes
            .iter()
            .map(|include| {
                let alias = include.alias_name();
                let size = graph.children(alias, *root).map_or(0, <[_]>::len);
                format!("{}={}", alias, size)
            })
            .collect();
        println!("{} {}: {}", graph.root_table(), root, collections.join(", "));
    }
}

async fn first_product(loader: &GraphLoader, store: &dyn RelationalStore) -> anyhow::Result<()> {
    let studios = loader
        .load(store, &LoadRequest::new("studios"), LoadStrategy::Split)
        .await?;

    let first = loader
        .first_child_per_parent(store, "studios", "products", studios.graph.roots(), &[])
        .await?;

    for studio in studios.graph.studios() {
        match first.get(&studio.id) {
            Some(product) => println!("{}: first product #{}", studio.name, product.id()),
            None => println!("{}: no products", studio.name),
        }
    }
    println!();
    println!(
        "{} studios resolved with one batched lookup",
        studios.graph.roots().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitload_orm::{SeedConfig, SeedData};

    #[test]
    fn test_demo_names() {
        let names: Vec<String> = Demo::value_variants()
            .iter()
            .filter_map(|d| d.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "n-plus-one",
                "batched-prices",
                "include-prices",
                "products-by-studio",
                "cartesian",
                "split",
                "filtered-split",
                "first-product"
            ]
        );
    }

    #[tokio::test]
    async fn test_every_graph_demo_loads() {
        let store = SeedData::generate(&SeedConfig::default())
            .unwrap()
            .into_memory_store()
            .unwrap();
        let loader = GraphLoader::new();

        for demo in Demo::value_variants() {
            if let Some((request, strategy)) = demo.plan() {
                let outcome = loader.load(&store, &request, strategy).await.unwrap();
                assert!(!outcome.graph.roots().is_empty(), "{:?}", demo);
            }
        }
    }
}
