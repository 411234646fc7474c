//! Outbox relay configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pending rows younger than this are left to the post-commit path
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Relay attempts before a row is dead-lettered
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Published rows older than this are purged
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl OutboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidOutboxSetting("poll_interval_ms must be positive"));
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidOutboxSetting("batch_size must be positive"));
        }
        if self.max_delivery_attempts == 0 {
            return Err(ValidationError::InvalidOutboxSetting(
                "max_delivery_attempts must be positive",
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ValidationError::InvalidOutboxSetting(
                "cleanup_interval_secs must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            grace_period_secs: default_grace_period(),
            max_delivery_attempts: default_max_delivery_attempts(),
            cleanup_interval_secs: default_cleanup_interval(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_batch_size() -> u32 {
    100
}

fn default_grace_period() -> u64 {
    30
}

fn default_max_delivery_attempts() -> u32 {
    5
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_retention_hours() -> u32 {
    72
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_follow_fields() {
        let config = OutboxConfig {
            poll_interval_ms: 250,
            grace_period_secs: 10,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.grace_period(), Duration::from_secs(10));
    }

    #[test]
    fn zero_batch_is_rejected() {
        let config = OutboxConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_grace_period_is_allowed() {
        let config = OutboxConfig {
            grace_period_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
