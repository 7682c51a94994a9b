//! End-to-end graph loading against the in-memory store

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use splitload_orm::{
    BatchConfig, GraphLoader, Include, InMemoryStore, LoadRequest, LoadStrategy, ModelError,
    OrderBy, OrmResult, Predicate, RelationalStore, SeedConfig, SeedData, StoreQuery, StoreRow,
};

fn seeded(config: &SeedConfig) -> InMemoryStore {
    SeedData::generate(config)
        .unwrap()
        .into_memory_store()
        .unwrap()
}

fn studio_graph() -> LoadRequest {
    LoadRequest::new("studios").include(
        Include::new("products")
            .include(Include::new("prices"))
            .include(Include::new("sellers")),
    )
}

#[tokio::test]
async fn test_split_load_costs_one_query_per_relation() {
    let store = seeded(&SeedConfig::default());
    let loader = GraphLoader::new();

    let outcome = loader
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap();

    assert_eq!(outcome.stats.query_count, 4);
    assert_eq!(outcome.stats.rows_fetched, 5 + 100 + 1000 + 200);
    assert_eq!(outcome.stats.depth_loaded, 2);
    assert_eq!(store.stats().queries, 4);

    let graph = &outcome.graph;
    assert_eq!(graph.studios().len(), 5);
    assert_eq!(graph.count("products"), 100);
    assert_eq!(graph.count("prices"), 1000);
    assert_eq!(graph.count("sellers"), 2);
    for studio in graph.studios() {
        let products = graph.products_of(studio.id);
        assert_eq!(products.len(), 20);
        for product in products {
            assert_eq!(graph.prices_of(product.id).len(), 10);
            assert_eq!(graph.sellers_of(product.id).len(), 2);
            assert_eq!(graph.studio_of(product).map(|s| s.id), Some(studio.id));
        }
    }
}

#[tokio::test]
async fn test_split_query_count_does_not_grow_with_collection_size() {
    for prices_per_product in [1, 25] {
        let store = seeded(&SeedConfig {
            prices_per_product,
            ..SeedConfig::default()
        });

        let outcome = GraphLoader::new()
            .load(&store, &studio_graph(), LoadStrategy::Split)
            .await
            .unwrap();

        assert_eq!(outcome.stats.query_count, 4, "{} prices", prices_per_product);
        assert_eq!(outcome.graph.count("prices"), 100 * prices_per_product);
    }
}

#[tokio::test]
async fn test_per_parent_load_costs_one_query_per_parent_row() {
    let store = seeded(&SeedConfig::default());

    let outcome = GraphLoader::new()
        .load(&store, &studio_graph(), LoadStrategy::PerParent)
        .await
        .unwrap();

    // root + one per studio + two per product
    assert_eq!(outcome.stats.query_count, 1 + 5 + 100 + 100);
    assert_eq!(outcome.graph.count("prices"), 1000);
}

#[tokio::test]
async fn test_single_query_multiplies_rows() {
    let store = seeded(&SeedConfig::default());

    let outcome = GraphLoader::new()
        .load(&store, &studio_graph(), LoadStrategy::SingleQuery)
        .await
        .unwrap();

    assert_eq!(outcome.stats.query_count, 1);
    // 10 prices x 2 sellers per product
    assert_eq!(outcome.stats.rows_fetched, 2000);
    assert_eq!(outcome.graph.count("prices"), 1000);
}

#[tokio::test]
async fn test_all_strategies_build_the_same_graph() {
    let store = seeded(&SeedConfig::default());
    let loader = GraphLoader::new();

    let split = loader
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap();
    for strategy in [LoadStrategy::SingleQuery, LoadStrategy::PerParent] {
        let other = loader.load(&store, &studio_graph(), strategy).await.unwrap();
        assert!(
            split.graph.same_membership(&other.graph),
            "{} disagrees with split",
            strategy
        );
        assert_eq!(split.graph.roots(), other.graph.roots());
    }
}

#[tokio::test]
async fn test_aliases_resembling_nested_paths_stay_apart() {
    let store = seeded(&SeedConfig {
        products: 10,
        prices_per_product: 3,
        ..SeedConfig::default()
    });
    let request = LoadRequest::new("studios")
        .include(
            Include::new("products")
                .alias("p")
                .include(Include::new("prices").alias("x")),
        )
        .include(Include::new("products").alias("p__x"));
    let loader = GraphLoader::new();

    let split = loader
        .load(&store, &request, LoadStrategy::Split)
        .await
        .unwrap();
    let joined = loader
        .load(&store, &request, LoadStrategy::SingleQuery)
        .await
        .unwrap();

    assert!(split.graph.same_membership(&joined.graph));
    for graph in [&split.graph, &joined.graph] {
        assert_eq!(graph.children("p__x", 1).map(<[_]>::len), Some(2));
        assert_eq!(graph.children("p", 1), graph.children("p__x", 1));
    }
}

#[tokio::test]
async fn test_requested_order_survives_every_strategy() {
    let store = seeded(&SeedConfig::default());
    let request = LoadRequest::new("studios")
        .order_by(OrderBy::desc("id"))
        .include(
            Include::new("products")
                .order_by(OrderBy::desc("id"))
                .include(Include::new("prices").order_by(OrderBy::desc("id")))
                .include(Include::new("sellers")),
        );

    for strategy in LoadStrategy::ALL {
        let graph = GraphLoader::new()
            .load(&store, &request, strategy)
            .await
            .unwrap()
            .graph;

        assert_eq!(graph.roots(), &[5, 4, 3, 2, 1], "{}", strategy);
        let products: Vec<i32> = graph.products_of(2).iter().map(|p| p.id).collect();
        assert_eq!(products[..3], [96, 91, 86], "{}", strategy);
        let prices: Vec<i32> = graph.prices_of(4).iter().map(|p| p.id).collect();
        assert_eq!(prices, (31..=40).rev().collect::<Vec<_>>(), "{}", strategy);
    }
}

#[tokio::test]
async fn test_empty_root_set_skips_relation_queries() {
    let store = seeded(&SeedConfig::default());
    let request = studio_graph().filter(Predicate::eq("studios", "name", "Studio 42"));

    let outcome = GraphLoader::new()
        .load(&store, &request, LoadStrategy::Split)
        .await
        .unwrap();

    assert_eq!(outcome.stats.query_count, 1);
    assert!(outcome.graph.roots().is_empty());
    assert_eq!(outcome.graph.count("products"), 0);
}

#[tokio::test]
async fn test_parent_without_children_gets_empty_collection() {
    // products 1..3 belong to studios 2..4
    let store = seeded(&SeedConfig {
        products: 3,
        ..SeedConfig::default()
    });

    for strategy in LoadStrategy::ALL {
        let graph = GraphLoader::new()
            .load(&store, &studio_graph(), strategy)
            .await
            .unwrap()
            .graph;

        assert_eq!(graph.children("products", 1), Some(&[][..]), "{}", strategy);
        assert_eq!(graph.children("products", 5), Some(&[][..]), "{}", strategy);
        assert_eq!(graph.children("products", 2), Some(&[1][..]), "{}", strategy);
    }
}

#[tokio::test]
async fn test_same_relation_under_two_filtered_aliases() {
    let store = seeded(&SeedConfig::default());
    let request = LoadRequest::new("studios")
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
        );

    let split = GraphLoader::new()
        .load(&store, &request, LoadStrategy::Split)
        .await
        .unwrap();
    assert_eq!(split.stats.query_count, 5);

    let graph = &split.graph;
    for studio in graph.studios() {
        let infinity = graph.products_in("infinity", studio.id);
        let endgame = graph.products_in("endgame", studio.id);
        assert_eq!(infinity.len(), 10);
        assert_eq!(endgame.len(), 10);
        assert!(infinity.iter().all(|p| p.name == "Infinity"));
        assert!(endgame.iter().all(|p| p.name == "Endgame"));
    }

    // one studio keeps the cartesian product of both aliases small
    let one_studio = request.filter(Predicate::eq("studios", "id", 1));
    let split = GraphLoader::new()
        .load(&store, &one_studio, LoadStrategy::Split)
        .await
        .unwrap();
    let joined = GraphLoader::new()
        .load(&store, &one_studio, LoadStrategy::SingleQuery)
        .await
        .unwrap();
    assert_eq!(joined.stats.rows_fetched, 10 * 10 * 10 * 10);
    assert!(split.graph.same_membership(&joined.graph));
}

#[tokio::test]
async fn test_belongs_to_and_many_to_many() {
    let store = seeded(&SeedConfig::default());
    let request = LoadRequest::new("products")
        .filter(Predicate::lte("products", "id", 10))
        .include(Include::new("studio"));

    let split = GraphLoader::new()
        .load(&store, &request, LoadStrategy::Split)
        .await
        .unwrap();
    assert_eq!(split.stats.query_count, 2);
    // product i belongs to studio (i % 5) + 1
    assert_eq!(split.graph.children("studio", 1), Some(&[2][..]));
    assert_eq!(split.graph.children("studio", 5), Some(&[1][..]));

    let joined = GraphLoader::new()
        .load(&store, &request, LoadStrategy::SingleQuery)
        .await
        .unwrap();
    assert!(split.graph.same_membership(&joined.graph));

    let sellers = GraphLoader::new()
        .load(
            &store,
            &LoadRequest::new("sellers").include(Include::new("products")),
            LoadStrategy::Split,
        )
        .await
        .unwrap();
    assert_eq!(sellers.graph.products_in("products", 1).len(), 100);
    assert_eq!(sellers.graph.products_in("products", 2).len(), 100);
}

#[tokio::test]
async fn test_filtered_belongs_to_may_resolve_to_nothing() {
    let store = seeded(&SeedConfig::default());
    let request = LoadRequest::new("products").include(
        Include::new("studio").filter(Predicate::eq("studios", "name", "Studio 2")),
    );

    for strategy in LoadStrategy::ALL {
        let graph = GraphLoader::new()
            .load(&store, &request, strategy)
            .await
            .unwrap()
            .graph;
        assert_eq!(graph.children("studio", 1), Some(&[2][..]), "{}", strategy);
        assert_eq!(graph.children("studio", 2), Some(&[][..]), "{}", strategy);
    }
}

#[tokio::test]
async fn test_host_function_filter_is_rejected_before_any_query() {
    let store = seeded(&SeedConfig::default());
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let request = LoadRequest::new("studios").include(Include::new("products").filter(
        Predicate::host_fn("is_deliverable_today", move |row| {
            row.get_date("products", "deliverable_from")
                .map(|from| from <= today)
                .unwrap_or(false)
        }),
    ));

    for strategy in LoadStrategy::ALL {
        let err = GraphLoader::new()
            .load(&store, &request, strategy)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::NotTranslatable { .. }));
    }
    assert_eq!(store.stats().queries, 0);

    // the same window as plain comparisons is accepted
    let translatable = LoadRequest::new("studios").include(
        Include::new("products").filter(
            Predicate::lte("products", "deliverable_from", today)
                .and(Predicate::gte("products", "deliverable_until", today)),
        ),
    );
    let outcome = GraphLoader::new()
        .load(&store, &translatable, LoadStrategy::Split)
        .await
        .unwrap();
    assert_eq!(outcome.graph.count("products"), 100);
}

#[tokio::test]
async fn test_include_depth_limit() {
    let store = seeded(&SeedConfig::default());
    let loader = GraphLoader::with_config(BatchConfig {
        max_depth: 1,
        ..BatchConfig::default()
    })
    .unwrap();

    let err = loader
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
    assert_eq!(store.stats().queries, 0);
}

#[tokio::test]
async fn test_unavailable_store_fails_the_load() {
    let store = seeded(&SeedConfig::default());
    store.set_offline(true);

    for strategy in LoadStrategy::ALL {
        let err = GraphLoader::new()
            .load(&store, &studio_graph(), strategy)
            .await
            .unwrap_err();
        assert!(err.is_unavailable(), "{}", strategy);
    }
}

#[tokio::test]
async fn test_chunked_key_sets() {
    let store = seeded(&SeedConfig::default());
    let loader = GraphLoader::with_config(BatchConfig {
        max_batch_size: Some(2),
        ..BatchConfig::default()
    })
    .unwrap();

    let outcome = loader
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap();

    // 5 studios in 3 chunks, 100 products in 50 chunks for each child relation
    assert_eq!(outcome.stats.query_count, 1 + 3 + 50 + 50);
    assert_eq!(outcome.graph.count("prices"), 1000);
}

#[tokio::test]
async fn test_parallel_siblings_match_sequential_load() {
    let store = seeded(&SeedConfig::default());
    let parallel = GraphLoader::with_config(BatchConfig {
        parallel_siblings: true,
        ..BatchConfig::default()
    })
    .unwrap();

    let concurrent = parallel
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap();
    let sequential = GraphLoader::new()
        .load(&store, &studio_graph(), LoadStrategy::Split)
        .await
        .unwrap();

    assert_eq!(concurrent.stats.query_count, 4);
    assert_eq!(concurrent.graph, sequential.graph);
}

#[tokio::test]
async fn test_first_product_of_every_studio() {
    let store = seeded(&SeedConfig::default());

    let first = GraphLoader::new()
        .first_child_per_parent(&store, "studios", "products", &[1, 2, 3, 4, 5], &[])
        .await
        .unwrap();

    assert_eq!(store.stats().queries, 1);
    let ids: Vec<(i32, i32)> = first.iter().map(|(s, p)| (*s, p.id())).collect();
    assert_eq!(ids, vec![(1, 5), (2, 1), (3, 2), (4, 3), (5, 4)]);
}

/// Replays canned result sets, one per round trip
struct ScriptedStore {
    responses: Mutex<VecDeque<Vec<StoreRow>>>,
}

impl ScriptedStore {
    fn new(responses: Vec<Vec<StoreRow>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl RelationalStore for ScriptedStore {
    async fn execute(&self, _query: &StoreQuery) -> OrmResult<Vec<StoreRow>> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

fn product_row(id: i32, studio_id: i32) -> StoreRow {
    let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    StoreRow::new()
        .with("products", "id", id)
        .with("products", "name", "Infinity")
        .with("products", "deliverable_from", date)
        .with("products", "deliverable_until", date)
        .with("products", "studio_id", studio_id)
        .with("products", "group_id", 1)
}

#[tokio::test]
async fn test_child_with_unknown_parent_key_is_a_referential_violation() {
    let store = ScriptedStore::new(vec![
        vec![StoreRow::new()
            .with("studios", "id", 1)
            .with("studios", "name", "Studio 1")],
        vec![product_row(7, 99)],
    ]);

    let err = GraphLoader::new()
        .load(
            &store,
            &LoadRequest::new("studios").include(Include::new("products")),
            LoadStrategy::Split,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::ReferentialViolation(_)));
}

#[tokio::test]
async fn test_dangling_belongs_to_is_a_referential_violation() {
    // the referenced studio row never comes back
    let store = ScriptedStore::new(vec![vec![product_row(1, 3)], vec![]]);

    let err = GraphLoader::new()
        .load(
            &store,
            &LoadRequest::new("products").include(Include::new("studio")),
            LoadStrategy::Split,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::ReferentialViolation(_)));
}
