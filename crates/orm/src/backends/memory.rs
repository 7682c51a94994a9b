//! In-Memory Store Implementation
//!
//! A small relational engine over seeded tables. It evaluates inner and left
//! joins, store-native predicates, key scopes and ordering exactly the way the
//! PostgreSQL adapter's SQL would, enforces foreign keys and primary keys on
//! insert, and counts every round trip.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use super::core::{ColumnRef, RelationalStore, StoreQuery, StoreRow, StoreValue};
use crate::error::{ModelError, OrmResult};
use crate::model::{TableSchema, CATALOG};
use crate::query::types::{JoinType, OrderDirection};

/// Snapshot of the store's round-trip counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of `execute` calls that reached the engine
    pub queries: u64,
    /// Rows returned across those calls
    pub rows_returned: u64,
}

#[derive(Debug)]
struct Table {
    schema: &'static TableSchema,
    rows: Vec<StoreRow>,
}

/// In-memory relational store
#[derive(Debug)]
pub struct InMemoryStore {
    tables: BTreeMap<&'static str, Table>,
    queries: AtomicU64,
    rows_returned: AtomicU64,
    offline: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store holding every catalogue table
    pub fn new() -> Self {
        Self::with_catalog(CATALOG)
    }

    pub fn with_catalog(catalog: &'static [TableSchema]) -> Self {
        let tables = catalog
            .iter()
            .map(|schema| {
                (
                    schema.name,
                    Table {
                        schema,
                        rows: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            tables,
            queries: AtomicU64::new(0),
            rows_returned: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Insert a row given its values in schema column order
    pub fn insert(&mut self, table: &str, values: Vec<StoreValue>) -> OrmResult<()> {
        let schema = self.table(table)?.schema;
        if values.len() != schema.columns.len() {
            return Err(ModelError::Query(format!(
                "Table '{}' has {} columns, {} values given",
                table,
                schema.columns.len(),
                values.len()
            )));
        }

        let mut row = StoreRow::new();
        for (def, value) in schema.columns.iter().zip(values) {
            if value.is_null() {
                if !def.nullable {
                    return Err(ModelError::Query(format!(
                        "Null value in column '{}.{}' violates not-null constraint",
                        table, def.name
                    )));
                }
            } else if !def.kind.comparable_with(value.kind()) {
                return Err(ModelError::Query(format!(
                    "Column '{}.{}' expects {}, got {}",
                    table,
                    def.name,
                    def.kind,
                    value.kind()
                )));
            }
            row.push(ColumnRef::new(schema.name, def.name), value);
        }

        for fk in schema.foreign_keys {
            let value = row.get(schema.name, fk.column).unwrap_or(&StoreValue::Null);
            if value.is_null() {
                continue;
            }
            let referenced = self.table(fk.references)?;
            let exists = referenced
                .rows
                .iter()
                .any(|r| r.get(fk.references, "id").is_some_and(|id| id.store_eq(value)));
            if !exists {
                return Err(ModelError::ReferentialViolation(format!(
                    "{}.{} = {} has no matching row in '{}'",
                    table, fk.column, value, fk.references
                )));
            }
        }

        let target = self.table(table)?;
        let duplicate = target.rows.iter().any(|existing| {
            schema.primary_key.iter().all(|pk| {
                match (existing.get(schema.name, pk), row.get(schema.name, pk)) {
                    (Some(a), Some(b)) => a.store_eq(b),
                    _ => false,
                }
            })
        });
        if duplicate {
            return Err(ModelError::Database(format!(
                "duplicate key value violates primary key ({}) of '{}'",
                schema.primary_key.join(", "),
                table
            )));
        }

        if let Some(target) = self.tables.get_mut(schema.name) {
            target.rows.push(row);
        }
        Ok(())
    }

    /// Number of stored rows in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            queries: self.queries.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
        }
    }

    /// Simulate losing the store: every `execute` fails with
    /// `StoreUnavailable` until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn table(&self, name: &str) -> OrmResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| ModelError::Query(format!("Unknown table '{}'", name)))
    }

    fn evaluate(&self, query: &StoreQuery) -> OrmResult<Vec<StoreRow>> {
        let mut rows: Vec<StoreRow> = self.table(&query.table)?.rows.clone();

        for join in &query.joins {
            let right = self.table(&join.table)?;
            let right_rows: Vec<StoreRow> = right
                .rows
                .iter()
                .map(|r| r.project(&join.table, &join.alias))
                .collect();

            let mut joined = Vec::with_capacity(rows.len());
            for left in rows {
                let key = left.get_ref(&join.left).cloned().unwrap_or(StoreValue::Null);
                let mut matched = false;
                for candidate in &right_rows {
                    let on = candidate
                        .get_ref(&join.right)
                        .is_some_and(|v| v.store_eq(&key));
                    if !on {
                        continue;
                    }
                    let combined = concat(&left, candidate);
                    if join.condition.as_ref().map_or(true, |c| c.matches(&combined)) {
                        joined.push(combined);
                        matched = true;
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    let mut padded = left.clone();
                    for def in right.schema.columns {
                        padded.push(ColumnRef::new(&join.alias, def.name), StoreValue::Null);
                    }
                    joined.push(padded);
                }
            }
            rows = joined;
        }

        if let Some(scope) = &query.scope {
            rows.retain(|row| {
                row.get_ref(&scope.column)
                    .is_some_and(|v| scope.keys.iter().any(|k| v.store_eq(k)))
            });
        }

        if let Some(filter) = &query.filter {
            rows.retain(|row| filter.matches(row));
        }

        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &query.order_by {
                    let ordering = order_values(
                        a.get_ref(column).unwrap_or(&StoreValue::Null),
                        b.get_ref(column).unwrap_or(&StoreValue::Null),
                        *direction,
                    );
                    if ordering != CmpOrdering::Equal {
                        return ordering;
                    }
                }
                CmpOrdering::Equal
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut projected = StoreRow::new();
                for column in &query.select {
                    let value = row.get_ref(column).cloned().unwrap_or(StoreValue::Null);
                    projected.push(column.clone(), value);
                }
                projected
            })
            .collect())
    }
}

#[async_trait]
impl RelationalStore for InMemoryStore {
    async fn execute(&self, query: &StoreQuery) -> OrmResult<Vec<StoreRow>> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(ModelError::StoreUnavailable(
                "in-memory store is offline".to_string(),
            ));
        }

        self.queries.fetch_add(1, Ordering::Relaxed);
        let rows = self.evaluate(query)?;
        self.rows_returned
            .fetch_add(rows.len() as u64, Ordering::Relaxed);

        tracing::debug!(table = %query.table, joins = query.joins.len(), rows = rows.len(), "store round trip");
        Ok(rows)
    }
}

fn concat(left: &StoreRow, right: &StoreRow) -> StoreRow {
    let mut combined = left.clone();
    for (column, value) in right.iter() {
        combined.push(column.clone(), value.clone());
    }
    combined
}

/// PostgreSQL ordering: NULLs sort last ascending and first descending
fn order_values(a: &StoreValue, b: &StoreValue, direction: OrderDirection) -> CmpOrdering {
    let ascending = match (a.is_null(), b.is_null()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => a.compare(b).unwrap_or(CmpOrdering::Equal),
    };
    match direction {
        OrderDirection::Asc => ascending,
        OrderDirection::Desc => ascending.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::StorePredicate;

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.insert("studios", vec![1.into(), "Studio 1".into()]).unwrap();
        store.insert("studios", vec![2.into(), "Studio 2".into()]).unwrap();
        store.insert("product_groups", vec![1.into()]).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        for (id, name, studio) in [(1, "Endgame", 1), (2, "Infinity", 1), (3, "Endgame", 1)] {
            store
                .insert(
                    "products",
                    vec![id.into(), name.into(), date.into(), date.into(), studio.into(), 1.into()],
                )
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_left_join_pads_parents_without_children() {
        let store = store();
        let query = StoreQuery::from("studios", &["id"])
            .join(
                JoinType::Left,
                "products",
                &["id"],
                ColumnRef::new("studios", "id"),
                "studio_id",
            )
            .order_by(ColumnRef::new("studios", "id"), OrderDirection::Asc);

        let rows = store.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[3].is_null_entity("products"));
        assert_eq!(rows[3].get_i32("studios", "id").unwrap(), 2);
        assert_eq!(store.stats().queries, 1);
        assert_eq!(store.stats().rows_returned, 4);
    }

    #[tokio::test]
    async fn test_scope_filter_and_descending_order() {
        let store = store();
        let query = StoreQuery::from("products", &["id", "name"])
            .scoped(ColumnRef::new("products", "studio_id"), vec![1.into()])
            .filter(Some(StorePredicate::Contains {
                column: ColumnRef::new("products", "name"),
                needle: "End".into(),
            }))
            .order_by(ColumnRef::new("products", "id"), OrderDirection::Desc);

        let rows = store.execute(&query).await.unwrap();
        let ids: Vec<i32> = rows.iter().map(|r| r.get_i32("products", "id").unwrap()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = store();
        store.set_offline(true);
        let err = store
            .execute(&StoreQuery::from("studios", &["id"]))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(store.stats().queries, 0);
    }

    #[test]
    fn test_insert_enforces_foreign_keys() {
        let mut store = store();
        let err = store
            .insert("prices", vec![1.into(), 99.into(), rust_decimal::Decimal::new(4200, 2).into()])
            .unwrap_err();
        assert!(matches!(err, ModelError::ReferentialViolation(_)));
    }

    #[test]
    fn test_insert_enforces_composite_key() {
        let mut store = store();
        store.insert("sellers", vec![1.into(), "Seller 1".into()]).unwrap();
        store.insert("seller_products", vec![1.into(), 1.into()]).unwrap();
        assert!(store.insert("seller_products", vec![1.into(), 1.into()]).is_err());
        assert_eq!(store.row_count("seller_products"), 1);
    }
}
