//! Batched child lookup
//!
//! Given a set of parent keys, one query fetches every child row of a
//! relation whose key is in the set, and the rows are grouped by that key in
//! the order the store returned them.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    backends::{ColumnRef, RelationalStore, StoreQuery, StoreRow, StoreValue},
    conditions::StorePredicate,
    error::{OrmError, OrmResult},
    model::{table_schema, EntityId},
    query::{JoinType, OrderBy},
    relationships::{RelationDef, RelationKind},
};

pub mod config;

pub use config::BatchConfig;

/// Child rows grouped by parent key, each group in store order
pub type ChildRows = BTreeMap<EntityId, Vec<StoreRow>>;

/// Batch loader for relation loading
#[derive(Debug, Clone, Default)]
pub struct BatchLoader {
    config: BatchConfig,
}

impl BatchLoader {
    /// Create a new batch loader with default configuration
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    /// Create a new batch loader with custom configuration
    pub fn with_config(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Fetch the children of `relation` for every key in `keys`.
    ///
    /// The key is the parent id for has-many and many-to-many relations and
    /// the referenced id for belongs-to relations. An empty key set returns an
    /// empty mapping without touching the store. Keys without children are
    /// absent from the mapping.
    pub async fn fetch_children_by_parent_keys<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        keys: &BTreeSet<EntityId>,
        relation: &RelationDef,
        filter: Option<&StorePredicate>,
        order: &[OrderBy],
    ) -> OrmResult<ChildRows> {
        if keys.is_empty() {
            tracing::trace!(relation = %relation.qualified_name(), "empty key set, lookup skipped");
            return Ok(ChildRows::new());
        }

        let all: Vec<EntityId> = keys.iter().copied().collect();
        let chunk_size = self.config.max_batch_size.unwrap_or(all.len()).max(1);

        let mut grouped = ChildRows::new();
        for chunk in all.chunks(chunk_size) {
            let query = child_query(relation, chunk, filter, order)?;
            let rows = store.execute(&query).await?;
            tracing::debug!(
                relation = %relation.qualified_name(),
                keys = chunk.len(),
                rows = rows.len(),
                "batched lookup"
            );
            group_by_parent_id(relation, keys, rows, &mut grouped)?;
        }

        Ok(grouped)
    }

    /// First child of every parent under `order` (ascending id when empty),
    /// fetched with a single batched lookup
    pub async fn first_child_per_parent<S: RelationalStore + ?Sized>(
        &self,
        store: &S,
        keys: &BTreeSet<EntityId>,
        relation: &RelationDef,
        order: &[OrderBy],
    ) -> OrmResult<BTreeMap<EntityId, StoreRow>> {
        let by_id = [OrderBy::asc("id")];
        let order = if order.is_empty() { &by_id[..] } else { order };

        let grouped = self
            .fetch_children_by_parent_keys(store, keys, relation, None, order)
            .await?;
        Ok(grouped
            .into_iter()
            .filter_map(|(key, rows)| rows.into_iter().next().map(|first| (key, first)))
            .collect())
    }
}

fn child_columns(table: &str) -> OrmResult<Vec<&'static str>> {
    table_schema(table)
        .map(|schema| schema.column_names())
        .ok_or_else(|| OrmError::Query(format!("Unknown table '{}'", table)))
}

/// Column of the fetched rows that carries the grouping key
fn key_column(relation: &RelationDef) -> OrmResult<ColumnRef> {
    Ok(match relation.kind {
        RelationKind::HasMany => ColumnRef::new(relation.child_table, relation.foreign_key),
        RelationKind::BelongsTo => ColumnRef::new(relation.child_table, "id"),
        RelationKind::ManyToMany => {
            let pivot = relation.pivot()?;
            ColumnRef::new(pivot.table, pivot.near_key)
        }
    })
}

/// Build the single query fetching the children of `keys`
fn child_query(
    relation: &RelationDef,
    keys: &[EntityId],
    filter: Option<&StorePredicate>,
    order: &[OrderBy],
) -> OrmResult<StoreQuery> {
    let columns = child_columns(relation.child_table)?;
    let scope: Vec<StoreValue> = keys.iter().map(|k| StoreValue::Int32(*k)).collect();

    let mut query = match relation.kind {
        RelationKind::HasMany | RelationKind::BelongsTo => {
            StoreQuery::from(relation.child_table, &columns)
        }
        // Pivot and far side in one round trip
        RelationKind::ManyToMany => {
            let pivot = relation.pivot()?;
            StoreQuery::from(pivot.table, &[pivot.near_key]).join(
                JoinType::Left,
                relation.child_table,
                &columns,
                ColumnRef::new(pivot.table, pivot.far_key),
                "id",
            )
        }
    }
    .scoped(key_column(relation)?, scope)
    .filter(filter.cloned());

    for o in order {
        query = query.order_by(ColumnRef::new(relation.child_table, &o.column), o.direction);
    }
    Ok(query)
}

/// Group fetched rows by their key, rejecting rows whose key is missing or
/// outside the requested set
fn group_by_parent_id(
    relation: &RelationDef,
    keys: &BTreeSet<EntityId>,
    rows: Vec<StoreRow>,
    grouped: &mut ChildRows,
) -> OrmResult<()> {
    let key_column = key_column(relation)?;

    for row in rows {
        let key = row
            .get_ref(&key_column)
            .and_then(StoreValue::as_i64)
            .and_then(|k| EntityId::try_from(k).ok())
            .ok_or_else(|| {
                OrmError::ReferentialViolation(format!(
                    "{} row without a usable {} key",
                    relation.qualified_name(),
                    key_column
                ))
            })?;

        if !keys.contains(&key) {
            return Err(OrmError::ReferentialViolation(format!(
                "{} returned a row for key {} outside the requested set",
                relation.qualified_name(),
                key
            )));
        }

        let child = if relation.kind == RelationKind::ManyToMany {
            if row.is_null_entity(relation.child_table) {
                return Err(OrmError::ReferentialViolation(format!(
                    "{} association for key {} references no {} row",
                    relation.qualified_name(),
                    key,
                    relation.child_table
                )));
            }
            row.project(relation.child_table, relation.child_table)
        } else {
            row
        };

        grouped.entry(key).or_default().push(child);
    }
    Ok(())
}
