//! Core Store Traits
//!
//! This module defines the value, row and query shapes exchanged with a
//! relational store, and the `RelationalStore` trait every adapter implements.
//! A query is a plain description (table, joins, filter, sort, key scope); the
//! adapter decides how to evaluate it.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::conditions::StorePredicate;
use crate::error::{ModelError, OrmResult};
use crate::query::types::{JoinType, OrderDirection};

/// Store value enumeration for type-safe parameter binding and row decoding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl StoreValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::Null)
    }

    /// Integer view of the value, widening `Int32`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StoreValue::Int32(i) => Some(i64::from(*i)),
            StoreValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value kind, used in error messages
    pub fn kind(&self) -> ValueKind {
        match self {
            StoreValue::Null => ValueKind::Null,
            StoreValue::Bool(_) => ValueKind::Bool,
            StoreValue::Int32(_) | StoreValue::Int64(_) => ValueKind::Integer,
            StoreValue::Text(_) => ValueKind::Text,
            StoreValue::Decimal(_) => ValueKind::Decimal,
            StoreValue::Date(_) => ValueKind::Date,
        }
    }

    /// Compare two values the way the store compares them.
    ///
    /// Integers of both widths compare numerically, integers compare against
    /// decimals numerically, `NULL` compares to nothing.
    pub fn compare(&self, other: &StoreValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (StoreValue::Null, _) | (_, StoreValue::Null) => None,
            (StoreValue::Bool(a), StoreValue::Bool(b)) => Some(a.cmp(b)),
            (StoreValue::Text(a), StoreValue::Text(b)) => Some(a.cmp(b)),
            (StoreValue::Decimal(a), StoreValue::Decimal(b)) => Some(a.cmp(b)),
            (StoreValue::Date(a), StoreValue::Date(b)) => Some(a.cmp(b)),
            (StoreValue::Decimal(a), b) => b.as_i64().map(|b| a.cmp(&Decimal::from(b))),
            (a, StoreValue::Decimal(b)) => a.as_i64().map(|a| Decimal::from(a).cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }

    /// Equality under store semantics (`NULL = NULL` is not true)
    pub fn store_eq(&self, other: &StoreValue) -> bool {
        self.compare(other) == Some(std::cmp::Ordering::Equal)
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Null => write!(f, "NULL"),
            StoreValue::Bool(b) => write!(f, "{}", b),
            StoreValue::Int32(i) => write!(f, "{}", i),
            StoreValue::Int64(i) => write!(f, "{}", i),
            StoreValue::Text(s) => write!(f, "'{}'", s),
            StoreValue::Decimal(d) => write!(f, "{}", d),
            StoreValue::Date(d) => write!(f, "{}", d),
        }
    }
}

/// Coarse value kinds for predicate validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Text,
    Decimal,
    Date,
}

impl ValueKind {
    /// Whether values of the two kinds can be compared by the store
    pub fn comparable_with(self, other: ValueKind) -> bool {
        use ValueKind::*;
        matches!(
            (self, other),
            (Bool, Bool)
                | (Integer, Integer)
                | (Integer, Decimal)
                | (Decimal, Integer)
                | (Decimal, Decimal)
                | (Text, Text)
                | (Date, Date)
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Text => "text",
            ValueKind::Decimal => "decimal",
            ValueKind::Date => "date",
        };
        f.write_str(name)
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        StoreValue::Bool(value)
    }
}

impl From<i32> for StoreValue {
    fn from(value: i32) -> Self {
        StoreValue::Int32(value)
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        StoreValue::Int64(value)
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::Text(value)
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::Text(value.to_string())
    }
}

impl From<Decimal> for StoreValue {
    fn from(value: Decimal) -> Self {
        StoreValue::Decimal(value)
    }
}

impl From<NaiveDate> for StoreValue {
    fn from(value: NaiveDate) -> Self {
        StoreValue::Date(value)
    }
}

impl<T> From<Option<T>> for StoreValue
where
    T: Into<StoreValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => StoreValue::Null,
        }
    }
}

/// A table-qualified column reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Parse `"table.column"`
    pub fn parse(qualified: &str) -> OrmResult<Self> {
        match qualified.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok(Self::new(table, column))
            }
            _ => Err(ModelError::Query(format!(
                "Column '{}' is not table-qualified",
                qualified
            ))),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// One row returned by the store; columns are table-qualified and ordered as
/// selected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreRow {
    values: Vec<(ColumnRef, StoreValue)>,
}

impl StoreRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: ColumnRef, value: StoreValue) {
        self.values.push((column, value));
    }

    pub fn with(mut self, table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        self.push(ColumnRef::new(table, column), value.into());
        self
    }

    /// Get a column value by table and column name
    pub fn get(&self, table: &str, column: &str) -> Option<&StoreValue> {
        self.values
            .iter()
            .find(|(c, _)| c.table == table && c.column == column)
            .map(|(_, v)| v)
    }

    pub fn get_ref(&self, column: &ColumnRef) -> Option<&StoreValue> {
        self.get(&column.table, &column.column)
    }

    fn required(&self, table: &str, column: &str) -> OrmResult<&StoreValue> {
        self.get(table, column).ok_or_else(|| {
            ModelError::Serialization(format!("Column '{}.{}' not found in row", table, column))
        })
    }

    pub fn get_i32(&self, table: &str, column: &str) -> OrmResult<i32> {
        match self.required(table, column)? {
            StoreValue::Int32(i) => Ok(*i),
            StoreValue::Int64(i) => i32::try_from(*i).map_err(|_| {
                ModelError::Serialization(format!("{}.{} = {} overflows i32", table, column, i))
            }),
            other => Err(Self::mismatch(table, column, "integer", other)),
        }
    }

    pub fn get_text(&self, table: &str, column: &str) -> OrmResult<String> {
        match self.required(table, column)? {
            StoreValue::Text(s) => Ok(s.clone()),
            other => Err(Self::mismatch(table, column, "text", other)),
        }
    }

    pub fn get_decimal(&self, table: &str, column: &str) -> OrmResult<Decimal> {
        match self.required(table, column)? {
            StoreValue::Decimal(d) => Ok(*d),
            StoreValue::Int32(i) => Ok(Decimal::from(*i)),
            StoreValue::Int64(i) => Ok(Decimal::from(*i)),
            other => Err(Self::mismatch(table, column, "decimal", other)),
        }
    }

    pub fn get_date(&self, table: &str, column: &str) -> OrmResult<NaiveDate> {
        match self.required(table, column)? {
            StoreValue::Date(d) => Ok(*d),
            other => Err(Self::mismatch(table, column, "date", other)),
        }
    }

    /// True when every column of `table` is `NULL` (LEFT JOIN padding) or the
    /// table contributed no columns at all.
    pub fn is_null_entity(&self, table: &str) -> bool {
        self.values
            .iter()
            .filter(|(c, _)| c.table == table)
            .all(|(_, v)| v.is_null())
    }

    /// Columns qualified by `alias`, re-qualified as `table`. Used to read an
    /// entity out of a joined row when its table was joined under an alias.
    pub fn project(&self, alias: &str, table: &str) -> StoreRow {
        StoreRow {
            values: self
                .values
                .iter()
                .filter(|(c, _)| c.table == alias)
                .map(|(c, v)| (ColumnRef::new(table, &c.column), v.clone()))
                .collect(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnRef> {
        self.values.iter().map(|(c, _)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnRef, &StoreValue)> {
        self.values.iter().map(|(c, v)| (c, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch(table: &str, column: &str, expected: &str, found: &StoreValue) -> ModelError {
        ModelError::Serialization(format!(
            "Column '{}.{}' expected {}, found {}",
            table,
            column,
            expected,
            found.kind()
        ))
    }
}

/// Join clause: `join_type table AS alias ON left = right`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    /// Name the joined table's columns are qualified with; equals `table`
    /// unless the same table is joined more than once
    pub alias: String,
    /// Column of a table already in the query
    pub left: ColumnRef,
    /// Column of the joined table
    pub right: ColumnRef,
    /// Extra condition evaluated as part of the join (keeps LEFT JOIN
    /// semantics for filtered includes)
    pub condition: Option<StorePredicate>,
}

/// Restricts a query to rows whose `column` is one of `keys`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyScope {
    pub column: ColumnRef,
    pub keys: Vec<StoreValue>,
}

/// A store query. Only store-native predicates can appear here; caller
/// predicates go through the translation guard first.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub table: String,
    pub select: Vec<ColumnRef>,
    pub joins: Vec<JoinClause>,
    pub filter: Option<StorePredicate>,
    pub order_by: Vec<(ColumnRef, OrderDirection)>,
    pub scope: Option<KeyScope>,
}

impl StoreQuery {
    /// Select every listed column from `table`
    pub fn from(table: &str, columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            select: columns.iter().map(|c| ColumnRef::new(table, c)).collect(),
            joins: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            scope: None,
        }
    }

    pub fn join(
        self,
        join_type: JoinType,
        table: &str,
        columns: &[&str],
        left: ColumnRef,
        right_column: &str,
    ) -> Self {
        self.join_as(join_type, table, table, columns, left, right_column, None)
    }

    /// Join `table` under `alias`, selecting `columns` qualified by the alias
    #[allow(clippy::too_many_arguments)]
    pub fn join_as(
        mut self,
        join_type: JoinType,
        table: &str,
        alias: &str,
        columns: &[&str],
        left: ColumnRef,
        right_column: &str,
        condition: Option<StorePredicate>,
    ) -> Self {
        self.select
            .extend(columns.iter().map(|c| ColumnRef::new(alias, c)));
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            alias: alias.to_string(),
            left,
            right: ColumnRef::new(alias, right_column),
            condition,
        });
        self
    }

    pub fn filter(mut self, predicate: Option<StorePredicate>) -> Self {
        self.filter = predicate;
        self
    }

    pub fn order_by(mut self, column: ColumnRef, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    pub fn scoped(mut self, column: ColumnRef, keys: Vec<StoreValue>) -> Self {
        self.scope = Some(KeyScope { column, keys });
        self
    }

}

/// Abstract relational store
///
/// One call to `execute` is one store round trip. Implementations return rows
/// in the order the query asks for (store order when no sort is given) and
/// never retry.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Execute a query and return the result rows
    async fn execute(&self, query: &StoreQuery) -> OrmResult<Vec<StoreRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_compare_numerically() {
        assert!(StoreValue::Int32(7).store_eq(&StoreValue::Int64(7)));
        assert!(!StoreValue::Null.store_eq(&StoreValue::Null));
        assert_eq!(
            StoreValue::Int32(42).compare(&StoreValue::Decimal(Decimal::new(4200, 2))),
            Some(std::cmp::Ordering::Equal)
        );
    }

    #[test]
    fn test_row_typed_access() {
        let row = StoreRow::new()
            .with("studios", "id", 3)
            .with("studios", "name", "Studio 3")
            .with("products", "id", StoreValue::Null);

        assert_eq!(row.get_i32("studios", "id").unwrap(), 3);
        assert_eq!(row.get_text("studios", "name").unwrap(), "Studio 3");
        assert!(row.get_text("studios", "id").is_err());
        assert!(row.is_null_entity("products"));
        assert!(!row.is_null_entity("studios"));
    }

    #[test]
    fn test_column_ref_parse() {
        let column = ColumnRef::parse("products.name").unwrap();
        assert_eq!(column, ColumnRef::new("products", "name"));
        assert!(ColumnRef::parse("name").is_err());
    }

    #[test]
    fn test_join_selects_joined_columns() {
        let query = StoreQuery::from("seller_products", &["product_id", "seller_id"]).join(
            JoinType::Left,
            "sellers",
            &["id", "name"],
            ColumnRef::new("seller_products", "seller_id"),
            "id",
        );
        assert_eq!(query.joins[0].alias, "sellers");
        assert_eq!(query.select.len(), 4);
    }
}
