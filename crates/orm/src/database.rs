//! Database Integration - PostgreSQL connection pool setup
//!
//! The pool is owned by the `PostgresStore` that wraps it; one store serves
//! one graph-load at a time from the caller's scope.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::ModelError;

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Connection acquisition failed: {0}")]
    AcquisitionFailed(#[from] sqlx::Error),

    #[error("Connection timeout after {timeout}s")]
    ConnectionTimeout { timeout: u64 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl From<PoolError> for ModelError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AcquisitionFailed(sqlx_err) => sqlx_err.into(),
            PoolError::ConnectionTimeout { timeout } => ModelError::StoreUnavailable(format!(
                "Database connection timeout after {}s",
                timeout
            )),
            PoolError::ConfigurationError { message } => ModelError::Configuration(message),
        }
    }
}

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::ConfigurationError {
                message: "max_connections must be greater than zero".to_string(),
            });
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::ConfigurationError {
                message: format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }
        Ok(())
    }
}

/// Validate a PostgreSQL connection URL
pub fn validate_database_url(url: &str) -> Result<(), PoolError> {
    if url.starts_with("postgresql://") || url.starts_with("postgres://") {
        Ok(())
    } else {
        Err(PoolError::ConfigurationError {
            message: "Invalid PostgreSQL URL scheme".to_string(),
        })
    }
}

/// Create a PostgreSQL pool and verify it can hand out a connection
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<Pool<Postgres>, ModelError> {
    validate_database_url(database_url)?;
    config.validate()?;

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .test_before_acquire(config.test_before_acquire);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }
    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    let pool = options.connect(database_url).await.map_err(|e| match e {
        sqlx::Error::PoolTimedOut => PoolError::ConnectionTimeout {
            timeout: config.acquire_timeout,
        },
        other => PoolError::AcquisitionFailed(other),
    })?;

    tracing::info!(
        max_connections = config.max_connections,
        size = pool.size(),
        "Database pool created"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let config = PoolConfig {
            min_connections: 20,
            ..PoolConfig::default()
        };
        let err: ModelError = config.validate().unwrap_err().into();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_database_url_scheme() {
        assert!(validate_database_url("postgres://localhost/splitload").is_ok());
        assert!(validate_database_url("mysql://localhost/splitload").is_err());
    }
}
