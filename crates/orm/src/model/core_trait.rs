//! Core Model Trait - Base definition for stored entities
//!
//! Defines the `Model` trait, the static table schema every entity publishes,
//! and the row conversion contract used by the loaders and seeders.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::backends::{StoreRow, StoreValue, ValueKind};
use crate::error::ModelResult;

/// Identifier type shared by every entity
pub type EntityId = i32;

/// Column definition in a table schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }
}

/// A foreign key declared by a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub column: &'static str,
    pub references: &'static str,
}

/// Static shape of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKeyDef],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// Core trait for stored entities
pub trait Model: Send + Sync + Debug + Clone + Serialize + for<'de> Deserialize<'de> {
    /// Table schema for this model
    fn schema() -> &'static TableSchema;

    /// Table name for this model
    fn table_name() -> &'static str {
        Self::schema().name
    }

    /// Selected column names, in schema order
    fn columns() -> Vec<&'static str> {
        Self::schema().column_names()
    }

    /// Identifier of this instance. Association rows without an identity of
    /// their own return `None`.
    fn id(&self) -> Option<EntityId>;

    /// Create a model instance from a row whose columns are qualified with
    /// `table_name()`
    fn from_row(row: &StoreRow) -> ModelResult<Self>
    where
        Self: Sized;

    /// Column values in schema order, used by seeders
    fn to_values(&self) -> Vec<StoreValue>;
}
