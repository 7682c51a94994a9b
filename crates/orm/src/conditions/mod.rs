//! Query Conditions
//!
//! Caller predicates, their store-native form, and the guard translating one
//! into the other.

pub mod predicate;
pub mod translate;

pub use predicate::{HostEval, Predicate, StorePredicate};
pub use translate::TranslationGuard;
