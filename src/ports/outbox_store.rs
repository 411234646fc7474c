//! OutboxStore port - Delivery bookkeeping for committed events.
//!
//! This port implements the read side of the Transactional Outbox Pattern.
//! Rows are written by `CommentTransaction::write_outbox` in the same
//! transaction as the comment change, so a committed change always has its
//! event on record even if the process dies before dispatch.
//!
//! ## Pattern Overview
//!
//! 1. Write path saves the comment AND its outbox rows in one transaction
//! 2. The post-commit hook dispatches the event immediately (fast path)
//! 3. `OutboxRelay` sweeps rows the fast path did not finish
//! 4. Rows that keep failing end up `DeadLettered`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::comment::CommentEvent;
use crate::domain::foundation::{DomainError, Timestamp};

/// Status of an outbox entry in the delivery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Event committed but not yet published
    Pending,
    /// Event successfully published to the stream
    Published,
    /// Event failed to publish (will be retried by the relay)
    Failed,
    /// Event gave up after the maximum number of attempts
    DeadLettered,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
            OutboxStatus::DeadLettered => "dead_lettered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            "dead_lettered" => Some(OutboxStatus::DeadLettered),
            _ => None,
        }
    }
}

/// An entry in the event outbox table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Unique identifier for this outbox entry
    pub id: Uuid,

    /// The committed domain event
    pub event: CommentEvent,

    /// Current delivery status
    pub status: OutboxStatus,

    /// When the event was written to the outbox
    pub created_at: Timestamp,

    /// When the event was last processed (published or failed)
    pub processed_at: Option<Timestamp>,

    /// Number of publish attempts
    pub attempts: u32,

    /// Last error message if failed
    pub last_error: Option<String>,

    /// Ordering key on the stream (the comment id)
    pub partition_key: String,
}

impl OutboxEntry {
    /// Create a new pending outbox entry for an event.
    pub fn new(event: CommentEvent) -> Self {
        let partition_key = event.comment_id().to_string();
        Self {
            id: Uuid::new_v4(),
            event,
            status: OutboxStatus::Pending,
            created_at: Timestamp::now(),
            processed_at: None,
            attempts: 0,
            last_error: None,
            partition_key,
        }
    }

    /// Mark the entry as successfully published.
    pub fn mark_published(&mut self) {
        self.status = OutboxStatus::Published;
        self.processed_at = Some(Timestamp::now());
        self.attempts += 1;
    }

    /// Mark the entry as failed with an error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = OutboxStatus::Failed;
        self.processed_at = Some(Timestamp::now());
        self.attempts += 1;
        self.last_error = Some(error.into());
    }

    /// Mark the entry as permanently undeliverable.
    pub fn mark_dead_lettered(&mut self, error: impl Into<String>) {
        self.status = OutboxStatus::DeadLettered;
        self.processed_at = Some(Timestamp::now());
        self.attempts += 1;
        self.last_error = Some(error.into());
    }

    /// Whether the relay may pick this entry up.
    ///
    /// Pending entries are only eligible once they are older than
    /// `stale_before`; younger ones still belong to the post-commit fast path.
    pub fn is_deliverable(&self, stale_before: &Timestamp) -> bool {
        match self.status {
            OutboxStatus::Pending => self.created_at.is_before(stale_before),
            OutboxStatus::Failed => true,
            OutboxStatus::Published | OutboxStatus::DeadLettered => false,
        }
    }
}

/// Port for reading and updating outbox rows after commit.
///
/// Every `mark_*` method counts as one delivery attempt.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Get entries the relay should (re)publish, ordered by creation time.
    ///
    /// Returns `Failed` entries and `Pending` entries created before
    /// `stale_before`. Limit controls batch size.
    async fn get_deliverable(
        &self,
        limit: u32,
        stale_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError>;

    /// Mark an event as successfully published.
    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError>;

    /// Mark an event as failed.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError>;

    /// Move an event to the dead-letter state.
    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DomainError>;

    /// Clean up old published events (retention policy).
    ///
    /// Deletes events that were published more than `older_than_hours` ago.
    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError>;
}
