//! EventPublisher port - Interface for publishing committed domain events.
//!
//! This port defines how committed events leave the process without the
//! application knowing about the transport (Redis Streams, in-memory, etc.).
//! It is only ever called from dispatch workers, never from the
//! transaction path.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::comment::CommentEvent;

/// Failure to get an event onto the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchFailure {
    /// The event could not be turned into its wire form.
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    /// The stream client rejected the send or could not be reached.
    #[error("Failed to send event to '{topic}': {message}")]
    Transport { topic: String, message: String },
}

impl DispatchFailure {
    /// Whether retrying the same send could succeed.
    ///
    /// A serialization failure is deterministic, so only transport errors
    /// are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchFailure::Transport { .. })
    }
}

impl From<serde_json::Error> for DispatchFailure {
    fn from(err: serde_json::Error) -> Self {
        DispatchFailure::Serialization(err.to_string())
    }
}

/// Port for publishing domain events.
///
/// Implementations must:
/// - Send to the stream that matches the event type
/// - Key every message by comment id so per-comment order is kept
/// - Return only after the stream acknowledged the send (or failed)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: &CommentEvent) -> Result<(), DispatchFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    #[test]
    fn only_transport_failures_are_retryable() {
        let transport = DispatchFailure::Transport {
            topic: "comment-created".to_string(),
            message: "connection refused".to_string(),
        };
        let serialization = DispatchFailure::Serialization("bad".to_string());

        assert!(transport.is_retryable());
        assert!(!serialization.is_retryable());
    }

    #[test]
    fn transport_failure_names_topic() {
        let err = DispatchFailure::Transport {
            topic: "comment-deleted".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to send event to 'comment-deleted': timeout"
        );
    }
}
