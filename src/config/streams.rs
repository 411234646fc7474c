//! Event stream configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Stream names and trimming for published comment events.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_created_topic")]
    pub comment_created_topic: String,

    #[serde(default = "default_deleted_topic")]
    pub comment_deleted_topic: String,

    /// Approximate cap on entries kept per stream
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl StreamsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.comment_created_topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic("comment_created_topic"));
        }
        if self.comment_deleted_topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic("comment_deleted_topic"));
        }
        if self.comment_created_topic == self.comment_deleted_topic {
            return Err(ValidationError::DuplicateTopics);
        }
        if self.max_len == 0 {
            return Err(ValidationError::InvalidStreamLength);
        }
        Ok(())
    }
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            comment_created_topic: default_created_topic(),
            comment_deleted_topic: default_deleted_topic(),
            max_len: default_max_len(),
        }
    }
}

fn default_created_topic() -> String {
    "comment-created".to_string()
}

fn default_deleted_topic() -> String {
    "comment-deleted".to_string()
}

fn default_max_len() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_separate_streams() {
        let config = StreamsConfig::default();
        assert_eq!(config.comment_created_topic, "comment-created");
        assert_eq!(config.comment_deleted_topic, "comment-deleted");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn same_stream_for_both_events_is_rejected() {
        let config = StreamsConfig {
            comment_deleted_topic: "comment-created".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::DuplicateTopics));
    }

    #[test]
    fn blank_topic_is_rejected() {
        let config = StreamsConfig {
            comment_created_topic: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
