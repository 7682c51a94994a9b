//! Error types for the graph-loading layer
//!
//! Store failures travel through the batched lookup and the query splitter
//! unchanged. The recomposer performs no I/O and never produces a store error.

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for graph-loading operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The relational store could not be reached (connection refused, pool
    /// closed, acquire timeout, cancelled round trip)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A foreign key in returned data does not resolve to a row of the
    /// expected table
    #[error("Referential violation: {0}")]
    ReferentialViolation(String),

    /// A filter predicate uses a construct the store cannot evaluate
    #[error("Predicate is not translatable to the store: {construct}")]
    NotTranslatable { construct: String },

    /// Malformed query or load request
    #[error("Query error: {0}")]
    Query(String),

    /// Any other failure reported by the store
    #[error("Database error: {0}")]
    Database(String),

    /// Row decoding or graph serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid loader or store configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    pub fn not_translatable(construct: impl Into<String>) -> Self {
        ModelError::NotTranslatable {
            construct: construct.into(),
        }
    }

    /// True for failures that mean the store was never reached or dropped the
    /// round trip.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ModelError::StoreUnavailable(_))
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ModelError::StoreUnavailable(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                ModelError::ReferentialViolation(db_err.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ModelError::Serialization(err.to_string())
            }
            _ => ModelError::Database(err.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
