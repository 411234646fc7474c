//! Redis Streams implementation of `StreamClient`.
//!
//! Each send is one `XADD` with an approximate `MAXLEN` cap, so streams are
//! trimmed cheaply instead of growing without bound. The message carries two
//! fields: `key` (the ordering key) and `value` (the JSON payload).
//! Consumers read with consumer groups and dedupe on the payload's
//! `eventId`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::config::{RedisConfig, StreamsConfig};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{StreamAck, StreamClient};

#[derive(Clone)]
pub struct RedisStreamClient {
    conn: MultiplexedConnection,
    max_len: usize,
    timeout: Duration,
}

impl RedisStreamClient {
    pub fn new(conn: MultiplexedConnection, max_len: usize, timeout: Duration) -> Self {
        Self {
            conn,
            max_len,
            timeout,
        }
    }

    /// Opens a multiplexed connection from configuration.
    pub async fn connect(redis: &RedisConfig, streams: &StreamsConfig) -> Result<Self, DomainError> {
        let client = redis::Client::open(redis.url.as_str()).map_err(stream_error)?;
        let conn = tokio::time::timeout(redis.timeout(), client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                DomainError::new(ErrorCode::StreamError, "Timed out connecting to Redis")
            })?
            .map_err(stream_error)?;
        Ok(Self::new(conn, streams.max_len, redis.timeout()))
    }

    fn xadd(&self, topic: &str, key: &str, value: &str) -> redis::Cmd {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("value")
            .arg(value);
        cmd
    }
}

#[async_trait]
impl StreamClient for RedisStreamClient {
    async fn send(&self, topic: &str, key: &str, value: &str) -> Result<StreamAck, DomainError> {
        let mut conn = self.conn.clone();
        let cmd = self.xadd(topic, key, value);

        let message_id: String = tokio::time::timeout(self.timeout, cmd.query_async::<_, String>(&mut conn))
            .await
            .map_err(|_| {
                DomainError::new(ErrorCode::StreamError, format!("XADD to '{}' timed out", topic))
            })?
            .map_err(stream_error)?;

        Ok(StreamAck {
            topic: topic.to_string(),
            message_id,
        })
    }
}

fn stream_error(err: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::StreamError, format!("Redis error: {}", err))
}

// Integration tests require a running Redis instance:
//
//     let client = RedisStreamClient::connect(&redis_config, &streams_config).await?;
//     let ack = client.send("comment-created", "c-1", "{}").await?;
//     assert!(!ack.message_id.is_empty());
