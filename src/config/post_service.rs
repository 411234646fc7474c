//! Post service client configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PostServiceConfig {
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl PostServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("POST_SERVICE__BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidPostServiceUrl);
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("post_service.timeout_ms"));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    3000
}
