use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    backends::{RelationalStore, StoreQuery, StoreRow},
    conditions::TranslationGuard,
    error::{ModelError, OrmResult},
    hydration::{Entity, ObjectGraph},
    loading::{
        batch_loader::{BatchConfig, BatchLoader},
        joined::JoinedLoader,
        plan::{LoadPlan, LoadRequest},
        splitter::{KeyBatching, QuerySplitter},
    },
    model::EntityId,
    query::OrderBy,
    relationships::find_relation,
};

/// How a graph is fetched from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// One LEFT JOIN query over the whole include tree
    SingleQuery,
    /// One root query plus one batched query per relation
    Split,
    /// One child query per parent row per relation
    PerParent,
}

impl LoadStrategy {
    pub const ALL: [LoadStrategy; 3] = [
        LoadStrategy::SingleQuery,
        LoadStrategy::Split,
        LoadStrategy::PerParent,
    ];
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStrategy::SingleQuery => "single-query",
            LoadStrategy::Split => "split",
            LoadStrategy::PerParent => "per-parent",
        };
        f.write_str(name)
    }
}

impl FromStr for LoadStrategy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single-query" | "single" | "joined" => Ok(LoadStrategy::SingleQuery),
            "split" => Ok(LoadStrategy::Split),
            "per-parent" | "n-plus-one" => Ok(LoadStrategy::PerParent),
            other => Err(ModelError::Configuration(format!(
                "Unknown load strategy '{}'",
                other
            ))),
        }
    }
}

/// Statistics about one graph load
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadStats {
    pub strategy: LoadStrategy,
    /// Store round trips issued by the load
    pub query_count: u64,
    /// Rows returned across those round trips
    pub rows_fetched: u64,
    /// Nesting depth of the include tree
    pub depth_loaded: usize,
    pub execution_time_ms: u64,
}

/// A loaded graph and what it cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    pub graph: ObjectGraph,
    pub stats: LoadStats,
}

/// Graph loader facade
///
/// Every load resolves the request into a plan first; an unknown relation, an
/// include tree deeper than `max_depth` or an untranslatable filter fails the
/// load before the store is contacted.
#[derive(Debug, Clone, Default)]
pub struct GraphLoader {
    batch_loader: BatchLoader,
    guard: TranslationGuard<'static>,
}

impl GraphLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BatchConfig) -> OrmResult<Self> {
        config.validate()?;
        Ok(Self {
            batch_loader: BatchLoader::with_config(config),
            guard: TranslationGuard::new(),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        self.batch_loader.config()
    }

    /// Load the graph described by `request` with `strategy`
    pub async fn load<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        request: &LoadRequest,
        strategy: LoadStrategy,
    ) -> OrmResult<LoadOutcome> {
        let start_time = Instant::now();
        let plan = LoadPlan::resolve(request, &self.guard, self.config())?;

        let counting = CountingStore::new(store);
        let loaded = match strategy {
            LoadStrategy::SingleQuery => JoinedLoader::new().load(&counting, &plan).await,
            LoadStrategy::Split => {
                QuerySplitter::new(&self.batch_loader, KeyBatching::Batched)
                    .load(&counting, &plan)
                    .await
            }
            LoadStrategy::PerParent => {
                QuerySplitter::new(&self.batch_loader, KeyBatching::PerParent)
                    .load(&counting, &plan)
                    .await
            }
        };

        let graph = match loaded {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(
                    root = %plan.root_table,
                    %strategy,
                    queries = counting.queries(),
                    error = %err,
                    "graph load failed"
                );
                return Err(err);
            }
        };

        let stats = LoadStats {
            strategy,
            query_count: counting.queries(),
            rows_fetched: counting.rows(),
            depth_loaded: plan.depth,
            execution_time_ms: u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            root = %plan.root_table,
            %strategy,
            roots = graph.roots().len(),
            queries = stats.query_count,
            rows = stats.rows_fetched,
            depth = stats.depth_loaded,
            elapsed_ms = stats.execution_time_ms,
            "graph loaded"
        );

        Ok(LoadOutcome { graph, stats })
    }

    /// First child of each parent under `order` (ascending id when empty), in
    /// one batched query regardless of the number of parents
    pub async fn first_child_per_parent<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        parent_table: &str,
        relation: &str,
        parent_ids: &[EntityId],
        order: &[OrderBy],
    ) -> OrmResult<BTreeMap<EntityId, Entity>> {
        let relation = find_relation(parent_table, relation)?;
        let keys: BTreeSet<EntityId> = parent_ids.iter().copied().collect();

        self.batch_loader
            .first_child_per_parent(store, &keys, relation, order)
            .await?
            .into_iter()
            .map(|(parent, row)| Ok((parent, Entity::decode(relation.child_table, &row)?)))
            .collect()
    }
}

/// Counts the round trips of one load, independent of other loads sharing
/// the same store
struct CountingStore<'s, S: ?Sized> {
    inner: &'s S,
    queries: AtomicU64,
    rows: AtomicU64,
}

impl<'s, S: ?Sized> CountingStore<'s, S> {
    fn new(inner: &'s S) -> Self {
        Self {
            inner,
            queries: AtomicU64::new(0),
            rows: AtomicU64::new(0),
        }
    }

    fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<'s, S: RelationalStore + ?Sized> RelationalStore for CountingStore<'s, S> {
    async fn execute(&self, query: &StoreQuery) -> OrmResult<Vec<StoreRow>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let rows = self.inner.execute(query).await?;
        self.rows.fetch_add(rows.len() as u64, Ordering::Relaxed);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in LoadStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<LoadStrategy>().unwrap(), strategy);
        }
        assert_eq!("N-Plus-One".parse::<LoadStrategy>().unwrap(), LoadStrategy::PerParent);
        assert!("lazy".parse::<LoadStrategy>().is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = BatchConfig {
            max_batch_size: Some(0),
            ..BatchConfig::default()
        };
        assert!(matches!(
            GraphLoader::with_config(config),
            Err(ModelError::Configuration(_))
        ));
    }
}
