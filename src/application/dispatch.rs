//! EventDispatcher - Delivers committed events to the stream.
//!
//! Runs on dispatch workers, never on the request path. Each delivery is
//! retried with exponential backoff for transient transport failures. The
//! final outcome is recorded on the outbox entry, which is what lets the
//! `OutboxRelay` pick up anything the fast path could not finish.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::comment::CommentEvent;
use crate::domain::foundation::DomainEvent;
use crate::ports::{DispatchFailure, EventPublisher, OutboxEntry, OutboxStore};

/// Backoff schedule for a single delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2,
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// One unit of dispatch work.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub event: CommentEvent,
    /// Outbox row to update, if the event went through a transaction.
    pub outbox_id: Option<Uuid>,
}

impl Delivery {
    pub fn from_entry(entry: &OutboxEntry) -> Self {
        Self {
            event: entry.event.clone(),
            outbox_id: Some(entry.id),
        }
    }

    /// An event raised outside any transaction.
    pub fn untracked(event: CommentEvent) -> Self {
        Self {
            event,
            outbox_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Published { attempts: u32 },
    Failed { attempts: u32, error: DispatchFailure },
}

pub struct EventDispatcher {
    publisher: Arc<dyn EventPublisher>,
    outbox: Arc<dyn OutboxStore>,
    retry: RetryPolicy,
}

impl EventDispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self::with_retry(publisher, outbox, RetryPolicy::default())
    }

    pub fn with_retry(
        publisher: Arc<dyn EventPublisher>,
        outbox: Arc<dyn OutboxStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            publisher,
            outbox,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Publishes one event, retrying transient failures.
    ///
    /// Never returns an error: failures are logged and recorded on the
    /// outbox entry so the relay can take over.
    pub async fn deliver(&self, delivery: Delivery) -> DeliveryOutcome {
        let event = &delivery.event;
        info!(
            event_type = event.event_type(),
            event_id = %event.event_id(),
            comment_id = %event.comment_id(),
            "Dispatching comment event"
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.publisher.publish(event).await {
                Ok(()) => {
                    info!(
                        event_type = event.event_type(),
                        comment_id = %event.comment_id(),
                        attempts = attempt,
                        "Comment event dispatched"
                    );
                    self.record_published(&delivery).await;
                    return DeliveryOutcome::Published { attempts: attempt };
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_after(attempt);
                    warn!(
                        event_type = event.event_type(),
                        comment_id = %event.comment_id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        event_type = event.event_type(),
                        comment_id = %event.comment_id(),
                        attempts = attempt,
                        error = %err,
                        "Dispatch failed, giving up"
                    );
                    self.record_failure(&delivery, &err).await;
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        error: err,
                    };
                }
            }
        }
    }

    async fn record_published(&self, delivery: &Delivery) {
        let Some(id) = delivery.outbox_id else {
            return;
        };
        if let Err(err) = self.outbox.mark_published(id).await {
            // The relay will deliver it again; consumers dedupe on eventId.
            warn!(outbox_id = %id, error = %err, "Could not mark outbox entry published");
        }
    }

    async fn record_failure(&self, delivery: &Delivery, failure: &DispatchFailure) {
        let Some(id) = delivery.outbox_id else {
            return;
        };
        let message = failure.to_string();
        let result = if failure.is_retryable() {
            self.outbox.mark_failed(id, &message).await
        } else {
            self.outbox.mark_dead_lettered(id, &message).await
        };
        if let Err(err) = result {
            warn!(outbox_id = %id, error = %err, "Could not record dispatch failure");
        }
    }
}
