//! In-memory stream client for testing.
//!
//! Records every accepted message so tests can assert on what reached the
//! stream, and can be told to fail a number of sends to exercise retry and
//! dead-letter paths.
//!
//! This adapter is for **testing and local runs only**. Nothing is
//! persisted and there are no consumers.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{StreamAck, StreamClient};

/// A message accepted by `InMemoryStreamClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub topic: String,
    pub key: String,
    pub value: String,
    pub message_id: String,
}

/// In-memory stream for testing.
///
/// # Example
///
/// ```ignore
/// let client = Arc::new(InMemoryStreamClient::failing_first(2));
///
/// // First two sends fail, the third lands
/// assert_eq!(client.message_count(), 1);
/// ```
#[derive(Default)]
pub struct InMemoryStreamClient {
    messages: RwLock<Vec<StreamMessage>>,
    failures_remaining: AtomicU32,
    always_fail: AtomicBool,
    attempts: AtomicU32,
}

impl InMemoryStreamClient {
    /// Creates a client that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client whose first `n` sends fail.
    pub fn failing_first(n: u32) -> Self {
        let client = Self::new();
        client.failures_remaining.store(n, Ordering::SeqCst);
        client
    }

    /// Creates a client that fails every send.
    pub fn always_failing() -> Self {
        let client = Self::new();
        client.always_fail.store(true, Ordering::SeqCst);
        client
    }

    /// Turns permanent failure on or off.
    pub fn set_failing(&self, failing: bool) {
        self.always_fail.store(failing, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<StreamMessage>> {
        self.messages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<StreamMessage>> {
        self.messages.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Test Helpers ===

    /// Returns every accepted message in send order.
    pub fn messages(&self) -> Vec<StreamMessage> {
        self.read().clone()
    }

    /// Returns messages sent to one topic.
    pub fn messages_on(&self, topic: &str) -> Vec<StreamMessage> {
        self.read()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Returns messages sent under one key.
    pub fn messages_for_key(&self, key: &str) -> Vec<StreamMessage> {
        self.read()
            .iter()
            .filter(|m| m.key == key)
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.read().len()
    }

    /// Number of sends attempted, successful or not.
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Clears all recorded messages (for test isolation).
    pub fn clear(&self) {
        self.write().clear();
    }

    fn should_fail(&self) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StreamClient for InMemoryStreamClient {
    async fn send(&self, topic: &str, key: &str, value: &str) -> Result<StreamAck, DomainError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.should_fail() {
            return Err(DomainError::new(
                ErrorCode::StreamError,
                format!("Simulated send failure on attempt {}", attempt),
            ));
        }

        let mut messages = self.write();
        let message_id = format!("{}-0", messages.len() + 1);
        messages.push(StreamMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            message_id: message_id.clone(),
        });

        Ok(StreamAck {
            topic: topic.to_string(),
            message_id,
        })
    }
}
