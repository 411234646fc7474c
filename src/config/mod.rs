//! Application configuration module
//!
//! Configuration is loaded from environment variables using the `config` and
//! `dotenvy` crates. Variables carry the `COMMENT_SERVICE` prefix and nested
//! values are separated with a double underscore.
//!
//! # Example
//!
//! ```no_run
//! use comment_service::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Publishing created events to {}", config.streams.comment_created_topic);
//! ```

mod database;
mod dispatch;
mod error;
mod logging;
mod outbox;
mod post_service;
mod redis;
mod streams;

pub use database::DatabaseConfig;
pub use dispatch::{DispatchConfig, RetrySettings, WorkerPoolSettings};
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use outbox::OutboxConfig;
pub use post_service::PostServiceConfig;
pub use redis::RedisConfig;
pub use streams::StreamsConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection for comments, likes and the outbox
    pub database: DatabaseConfig,

    /// Redis connection for the event streams
    pub redis: RedisConfig,

    /// Worker pools and retry policy for event delivery
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub streams: StreamsConfig,

    #[serde(default)]
    pub outbox: OutboxConfig,

    pub post_service: PostServiceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `COMMENT_SERVICE__DATABASE__URL=...` -> `database.url = ...`
    /// - `COMMENT_SERVICE__DISPATCH__RETRY__MAX_ATTEMPTS=5` -> `dispatch.retry.max_attempts = 5`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("COMMENT_SERVICE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.dispatch.validate()?;
        self.streams.validate()?;
        self.outbox.validate()?;
        self.post_service.validate()?;
        Ok(())
    }
}
