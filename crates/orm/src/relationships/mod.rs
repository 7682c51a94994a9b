//! Relationships Module - relation kinds and the catalogue's relation table

pub mod metadata;

pub use metadata::{find_relation, PivotDef, RelationDef, RelationKind, RELATIONS};
