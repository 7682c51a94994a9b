use std::env;
use std::fmt;
use std::str::FromStr;

use splitload_orm::{BatchConfig, StoreBackendType};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                field: "environment".to_string(),
                value: s.to_string(),
                expected: "development, testing, or production".to_string(),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: s.to_string(),
                expected: "plain, pretty, or json".to_string(),
            }),
        }
    }
}

/// Host process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreBackendType,
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Largest key set per batched lookup; `None` keeps one query per relation
    pub batch_size: Option<usize>,
    pub parallel_siblings: bool,
}

impl AppConfig {
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            store: StoreBackendType::Memory,
            database_url: Some("postgres://localhost/splitload_dev".to_string()),
            log_level: "debug".to_string(),
            log_format: LogFormat::Pretty,
            batch_size: None,
            parallel_siblings: false,
        }
    }

    pub fn testing() -> Self {
        Self {
            environment: Environment::Testing,
            store: StoreBackendType::Memory,
            database_url: Some("postgres://localhost/splitload_test".to_string()),
            log_level: "warn".to_string(),
            log_format: LogFormat::Plain,
            batch_size: None,
            parallel_siblings: false,
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            store: StoreBackendType::PostgreSQL,
            database_url: None, // Must be provided via env
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            batch_size: None,
            parallel_siblings: true,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Testing => Self::testing(),
            Environment::Production => Self::production(),
        }
    }

    /// Read configuration from environment variables, unvalidated
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok())
    }

    /// Load and validate configuration read through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::load(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration through `lookup`, starting from the defaults of
    /// the selected environment. Values are parsed but not validated, so
    /// command-line overrides can still be applied.
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("SPLITLOAD_ENV") {
            Some(env_str) => env_str.parse()?,
            None => Environment::Development,
        };
        let mut config = Self::for_environment(environment);

        if let Some(store) = lookup("SPLITLOAD_STORE") {
            config.store = store.parse().map_err(|_| ConfigError::InvalidValue {
                field: "store".to_string(),
                value: store.clone(),
                expected: "memory or postgres".to_string(),
            })?;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Some(level) = lookup("SPLITLOAD_LOG") {
            config.log_level = level;
        }

        if let Some(format) = lookup("SPLITLOAD_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        if let Some(size) = lookup("SPLITLOAD_BATCH_SIZE") {
            config.batch_size = Some(size.parse().map_err(|_| ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: size.clone(),
                expected: "a positive integer".to_string(),
            })?);
        }

        if let Some(parallel) = lookup("SPLITLOAD_PARALLEL") {
            config.parallel_siblings = parse_flag(&parallel).ok_or(ConfigError::InvalidValue {
                field: "parallel_siblings".to_string(),
                value: parallel.clone(),
                expected: "true or false".to_string(),
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                expected: format!("one of: {}", valid_levels.join(", ")),
            });
        }

        if self.batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
                expected: "a positive integer".to_string(),
            });
        }

        if self.store == StoreBackendType::PostgreSQL && self.database_url.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "database_url".to_string(),
                hint: "DATABASE_URL is required for the postgres store".to_string(),
            });
        }

        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_batch_size: self.batch_size,
            parallel_siblings: self.parallel_siblings,
            ..BatchConfig::default()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
