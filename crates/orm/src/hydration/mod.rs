//! Result Hydration
//!
//! The arena-backed `ObjectGraph` and the `GraphRecomposer` that fills it from
//! split result sets.

pub mod graph;
pub mod recomposer;

pub use graph::{Entity, ObjectGraph};
pub use recomposer::{ChildMap, GraphRecomposer, LoadedRelation};
