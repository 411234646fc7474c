//! Event dispatch configuration
//!
//! Sizing for the two worker pools plus the retry schedule used for each
//! delivery. Defaults match the service's production settings:
//!
//! | Pool | min | max | queue | prefix |
//! |------|-----|-----|-------|--------|
//! | `event_pool` | 2 | 5 | 100 | `comment-event` |
//! | `outbound_pool` | 1 | 3 | 50 | `external-api` |

use serde::Deserialize;
use std::time::Duration;

use crate::application::{RetryPolicy, WorkerPoolConfig};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_event_pool")]
    pub event_pool: WorkerPoolSettings,

    #[serde(default = "default_outbound_pool")]
    pub outbound_pool: WorkerPoolSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Dispatch immediately when an event is raised outside a transaction.
    /// When false, doing so is an error.
    #[serde(default = "default_true")]
    pub fallback_execution: bool,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.event_pool.validate("event_pool")?;
        self.outbound_pool.validate("outbound_pool")?;
        self.retry.validate()?;
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            event_pool: default_event_pool(),
            outbound_pool: default_outbound_pool(),
            retry: RetrySettings::default(),
            fallback_execution: true,
        }
    }
}

/// Sizing for one worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerPoolSettings {
    /// Worker name prefix, also used as the pool name in logs
    pub name: String,
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl WorkerPoolSettings {
    pub fn to_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.min_workers, self.max_workers, self.queue_capacity)
            .with_keep_alive(Duration::from_secs(self.keep_alive_secs))
    }

    fn validate(&self, pool: &'static str) -> Result<(), ValidationError> {
        let invalid = |reason| Err(ValidationError::InvalidWorkerPool { pool, reason });
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.min_workers == 0 {
            return invalid("min_workers must be at least 1");
        }
        if self.min_workers > self.max_workers {
            return invalid("min_workers exceeds max_workers");
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be at least 1");
        }
        Ok(())
    }
}

/// Backoff schedule for a single delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidRetryPolicy("max_attempts must be at least 1"));
        }
        if self.multiplier == 0 {
            return Err(ValidationError::InvalidRetryPolicy("multiplier must be at least 1"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::InvalidRetryPolicy(
                "initial_backoff_ms exceeds max_backoff_ms",
            ));
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_event_pool() -> WorkerPoolSettings {
    WorkerPoolSettings {
        name: "comment-event".to_string(),
        min_workers: 2,
        max_workers: 5,
        queue_capacity: 100,
        keep_alive_secs: default_keep_alive(),
    }
}

fn default_outbound_pool() -> WorkerPoolSettings {
    WorkerPoolSettings {
        name: "external-api".to_string(),
        min_workers: 1,
        max_workers: 3,
        queue_capacity: 50,
        keep_alive_secs: default_keep_alive(),
    }
}

fn default_keep_alive() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_backoff() -> u64 {
    2000
}
