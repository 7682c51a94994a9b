//! PostgreSQL Store Implementation
//!
//! `RelationalStore` over a sqlx PostgreSQL pool. Queries are rendered by
//! `StoreQuery::to_sql_with_params`; result columns come back aliased
//! `"table.column"` and are decoded into qualified `StoreRow`s.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row, TypeInfo};

use super::core::{ColumnRef, RelationalStore, StoreQuery, StoreRow, StoreValue};
use crate::database::{create_pool, PoolConfig};
use crate::error::{OrmError, OrmResult};

/// PostgreSQL-backed relational store
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Wrap an existing pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect a new pool to `database_url`
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let pool = create_pool(database_url, config).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Execute a statement that returns no rows (DDL, inserts)
    pub async fn execute_statement(&self, sql: &str, params: &[StoreValue]) -> OrmResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_store_value(query, param);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn execute(&self, query: &StoreQuery) -> OrmResult<Vec<StoreRow>> {
        let (sql, params) = query.to_sql_with_params();
        tracing::trace!(%sql, params = params.len(), "executing store query");

        let mut prepared = sqlx::query(&sql);
        for param in &params {
            prepared = bind_store_value(prepared, param);
        }

        let rows = prepared.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}

/// Bind a StoreValue to a sqlx query
fn bind_store_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &StoreValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        StoreValue::Null => query.bind(Option::<String>::None),
        StoreValue::Bool(b) => query.bind(*b),
        StoreValue::Int32(i) => query.bind(*i),
        StoreValue::Int64(i) => query.bind(*i),
        StoreValue::Text(s) => query.bind(s.clone()),
        StoreValue::Decimal(d) => query.bind(*d),
        StoreValue::Date(d) => query.bind(*d),
    }
}

fn decode_row(row: &PgRow) -> OrmResult<StoreRow> {
    let mut decoded = StoreRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let column_ref = ColumnRef::parse(column.name())?;
        decoded.push(column_ref, decode_value(row, index)?);
    }
    Ok(decoded)
}

/// Convert a PostgreSQL column value to StoreValue
fn decode_value(row: &PgRow, index: usize) -> OrmResult<StoreValue> {
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(StoreValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| StoreValue::Int32(i32::from(v))),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(StoreValue::Int32),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(StoreValue::Int64),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(StoreValue::Text)
        }
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(index)?
            .map(StoreValue::Decimal),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(StoreValue::Date),
        other => {
            return Err(OrmError::Serialization(format!(
                "Unsupported column type '{}' for column '{}'",
                other,
                row.columns()[index].name()
            )))
        }
    };

    Ok(value.unwrap_or(StoreValue::Null))
}
