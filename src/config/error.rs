//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Worker pool '{pool}' is invalid: {reason}")]
    InvalidWorkerPool { pool: &'static str, reason: &'static str },

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    #[error("Stream topic must not be empty: {0}")]
    EmptyTopic(&'static str),

    #[error("Created and deleted events must use different streams")]
    DuplicateTopics,

    #[error("Stream max length must be positive")]
    InvalidStreamLength,

    #[error("Invalid outbox setting: {0}")]
    InvalidOutboxSetting(&'static str),

    #[error("Post service URL must start with http:// or https://")]
    InvalidPostServiceUrl,

    #[error("Timeout must be positive: {0}")]
    InvalidTimeout(&'static str),
}
