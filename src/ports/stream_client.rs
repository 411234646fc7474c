//! StreamClient port - Raw access to the external event stream.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Acknowledgement returned by the stream for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAck {
    /// Stream the message landed on.
    pub topic: String,
    /// Broker-assigned message id (e.g. a Redis stream entry id).
    pub message_id: String,
}

/// Port for sending already-serialized messages to a keyed stream.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Append `value` to `topic` under ordering key `key`.
    ///
    /// Resolves once the broker has acknowledged the write.
    async fn send(&self, topic: &str, key: &str, value: &str) -> Result<StreamAck, DomainError>;
}
