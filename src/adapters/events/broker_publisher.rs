//! BrokerPublisher - `EventPublisher` over a keyed stream.
//!
//! Serializes each event to JSON, picks the stream for its type, and sends
//! it keyed by comment id so every event for one comment lands in order on
//! the same partition.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::StreamsConfig;
use crate::domain::comment::CommentEvent;
use crate::ports::{DispatchFailure, EventPublisher, StreamClient};

pub struct BrokerPublisher {
    client: Arc<dyn StreamClient>,
    created_topic: String,
    deleted_topic: String,
}

impl BrokerPublisher {
    pub fn new(client: Arc<dyn StreamClient>, streams: &StreamsConfig) -> Self {
        Self {
            client,
            created_topic: streams.comment_created_topic.clone(),
            deleted_topic: streams.comment_deleted_topic.clone(),
        }
    }

    /// Stream an event is sent to.
    pub fn topic_for(&self, event: &CommentEvent) -> &str {
        match event {
            CommentEvent::Created(_) => &self.created_topic,
            CommentEvent::Deleted(_) => &self.deleted_topic,
        }
    }
}

#[async_trait]
impl EventPublisher for BrokerPublisher {
    async fn publish(&self, event: &CommentEvent) -> Result<(), DispatchFailure> {
        let topic = self.topic_for(event);
        let key = event.comment_id().to_string();
        let value = serde_json::to_string(event)?;

        let ack = self
            .client
            .send(topic, &key, &value)
            .await
            .map_err(|err| DispatchFailure::Transport {
                topic: topic.to_string(),
                message: err.message,
            })?;

        debug!(topic = %ack.topic, message_id = %ack.message_id, key = %key, "Stream accepted event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryStreamClient;
    use crate::domain::comment::Comment;
    use crate::domain::foundation::{MemberId, PostId};

    fn comment() -> Comment {
        Comment::new(
            PostId::new("post-1").unwrap(),
            MemberId::new("member-1").unwrap(),
            "hello",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn events_are_routed_by_type_and_keyed_by_comment() {
        let client = Arc::new(InMemoryStreamClient::new());
        let publisher = BrokerPublisher::new(client.clone(), &StreamsConfig::default());
        let c = comment();

        publisher.publish(&CommentEvent::created(&c)).await.unwrap();
        publisher.publish(&CommentEvent::deleted(&c)).await.unwrap();

        let created = client.messages_on("comment-created");
        let deleted = client.messages_on("comment-deleted");
        assert_eq!(created.len(), 1);
        assert_eq!(deleted.len(), 1);
        assert_eq!(created[0].key, c.id().to_string());
        assert_eq!(deleted[0].key, c.id().to_string());
    }

    #[tokio::test]
    async fn payload_uses_wire_field_names() {
        let client = Arc::new(InMemoryStreamClient::new());
        let publisher = BrokerPublisher::new(client.clone(), &StreamsConfig::default());
        let c = comment();

        publisher.publish(&CommentEvent::created(&c)).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&client.messages()[0].value).unwrap();
        assert_eq!(value["eventType"], "comment.created");
        assert_eq!(value["commentUuid"], c.id().to_string());
        assert_eq!(value["postUuid"], "post-1");
        assert_eq!(value["memberUuid"], "member-1");
    }

    #[tokio::test]
    async fn client_failure_becomes_retryable_transport_failure() {
        let client = Arc::new(InMemoryStreamClient::always_failing());
        let publisher = BrokerPublisher::new(client, &StreamsConfig::default());

        let err = publisher
            .publish(&CommentEvent::created(&comment()))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(err, DispatchFailure::Transport { ref topic, .. } if topic == "comment-created"));
    }
}
