//! Filter predicates
//!
//! `Predicate` is what callers build. It may contain host closures the store
//! cannot evaluate. `StorePredicate` is the store-native subset produced by the
//! translation guard; both the in-memory engine and the SQL renderer interpret
//! it.

use std::fmt;
use std::sync::Arc;

use crate::backends::{ColumnRef, StoreRow, StoreValue};
use crate::query::types::QueryOperator;

/// Host-side row evaluator captured by `Predicate::HostFn`
pub type HostEval = Arc<dyn Fn(&StoreRow) -> bool + Send + Sync>;

/// Caller-facing filter predicate
#[derive(Clone)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: QueryOperator,
        value: StoreValue,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    In {
        column: ColumnRef,
        values: Vec<StoreValue>,
    },
    Contains {
        column: ColumnRef,
        needle: String,
    },
    IsNull(ColumnRef),
    /// Arbitrary Rust logic evaluated per row. Never translatable.
    HostFn { name: String, eval: HostEval },
}

impl Predicate {
    pub fn compare(table: &str, column: &str, op: QueryOperator, value: impl Into<StoreValue>) -> Self {
        Predicate::Compare {
            column: ColumnRef::new(table, column),
            op,
            value: value.into(),
        }
    }

    pub fn eq(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::Equal, value)
    }

    pub fn ne(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::NotEqual, value)
    }

    pub fn gt(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::GreaterThan, value)
    }

    pub fn gte(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::GreaterThanOrEqual, value)
    }

    pub fn lt(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::LessThan, value)
    }

    pub fn lte(table: &str, column: &str, value: impl Into<StoreValue>) -> Self {
        Self::compare(table, column, QueryOperator::LessThanOrEqual, value)
    }

    pub fn contains(table: &str, column: &str, needle: &str) -> Self {
        Predicate::Contains {
            column: ColumnRef::new(table, column),
            needle: needle.to_string(),
        }
    }

    pub fn is_in<V: Into<StoreValue>>(table: &str, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: ColumnRef::new(table, column),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(table: &str, column: &str) -> Self {
        Predicate::IsNull(ColumnRef::new(table, column))
    }

    pub fn host_fn<F>(name: &str, eval: F) -> Self
    where
        F: Fn(&StoreRow) -> bool + Send + Sync + 'static,
    {
        Predicate::HostFn {
            name: name.to_string(),
            eval: Arc::new(eval),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op, value)
            }
            Predicate::And(parts) => f.debug_tuple("And").field(parts).finish(),
            Predicate::Or(parts) => f.debug_tuple("Or").field(parts).finish(),
            Predicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Predicate::In { column, values } => write!(f, "{} IN {:?}", column, values),
            Predicate::Contains { column, needle } => write!(f, "{} CONTAINS {:?}", column, needle),
            Predicate::IsNull(column) => write!(f, "{} IS NULL", column),
            Predicate::HostFn { name, .. } => write!(f, "<host fn {}>", name),
        }
    }
}

/// Store-native predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum StorePredicate {
    True,
    False,
    Compare {
        column: ColumnRef,
        op: QueryOperator,
        value: StoreValue,
    },
    And(Vec<StorePredicate>),
    Or(Vec<StorePredicate>),
    Not(Box<StorePredicate>),
    /// Non-empty membership test
    In {
        column: ColumnRef,
        values: Vec<StoreValue>,
    },
    Contains {
        column: ColumnRef,
        needle: String,
    },
    IsNull(ColumnRef),
}

impl StorePredicate {
    /// Evaluate against a row with SQL three-valued logic; `None` is UNKNOWN.
    /// A missing column evaluates as `NULL`.
    pub fn evaluate(&self, row: &StoreRow) -> Option<bool> {
        match self {
            StorePredicate::True => Some(true),
            StorePredicate::False => Some(false),
            StorePredicate::Compare { column, op, value } => {
                let actual = row.get_ref(column).unwrap_or(&StoreValue::Null);
                actual.compare(value).map(|ordering| op.holds(ordering))
            }
            StorePredicate::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            StorePredicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            StorePredicate::Not(inner) => inner.evaluate(row).map(|b| !b),
            StorePredicate::In { column, values } => {
                let actual = row.get_ref(column).unwrap_or(&StoreValue::Null);
                if actual.is_null() {
                    return None;
                }
                Some(values.iter().any(|v| actual.store_eq(v)))
            }
            StorePredicate::Contains { column, needle } => {
                match row.get_ref(column).unwrap_or(&StoreValue::Null) {
                    StoreValue::Text(s) => Some(s.contains(needle.as_str())),
                    _ => None,
                }
            }
            StorePredicate::IsNull(column) => Some(
                row.get_ref(column)
                    .map(StoreValue::is_null)
                    .unwrap_or(true),
            ),
        }
    }

    /// True only when the row definitely satisfies the predicate
    pub fn matches(&self, row: &StoreRow) -> bool {
        self.evaluate(row) == Some(true)
    }

    /// Every column the predicate reads
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            StorePredicate::True | StorePredicate::False => {}
            StorePredicate::Compare { column, .. }
            | StorePredicate::In { column, .. }
            | StorePredicate::Contains { column, .. }
            | StorePredicate::IsNull(column) => out.push(column),
            StorePredicate::And(parts) | StorePredicate::Or(parts) => {
                for part in parts {
                    part.collect_columns(out);
                }
            }
            StorePredicate::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Copy of the predicate with every column of `from` qualified by `to`
    /// instead, for filters applied to a table joined under an alias
    pub fn requalify(&self, from: &str, to: &str) -> StorePredicate {
        let column_ref = |c: &ColumnRef| {
            if c.table == from {
                ColumnRef::new(to, &c.column)
            } else {
                c.clone()
            }
        };
        match self {
            StorePredicate::True => StorePredicate::True,
            StorePredicate::False => StorePredicate::False,
            StorePredicate::Compare { column, op, value } => StorePredicate::Compare {
                column: column_ref(column),
                op: *op,
                value: value.clone(),
            },
            StorePredicate::And(parts) => {
                StorePredicate::And(parts.iter().map(|p| p.requalify(from, to)).collect())
            }
            StorePredicate::Or(parts) => {
                StorePredicate::Or(parts.iter().map(|p| p.requalify(from, to)).collect())
            }
            StorePredicate::Not(inner) => StorePredicate::Not(Box::new(inner.requalify(from, to))),
            StorePredicate::In { column, values } => StorePredicate::In {
                column: column_ref(column),
                values: values.clone(),
            },
            StorePredicate::Contains { column, needle } => StorePredicate::Contains {
                column: column_ref(column),
                needle: needle.clone(),
            },
            StorePredicate::IsNull(column) => StorePredicate::IsNull(column_ref(column)),
        }
    }
}
