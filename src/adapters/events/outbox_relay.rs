//! OutboxRelay - Background sweeper for undelivered events.
//!
//! Events normally leave through the post-commit fast path. The relay is
//! the safety net for everything that path could not finish:
//!
//! 1. Application writes comment + outbox rows in one transaction
//! 2. Post-commit hook dispatches immediately and marks the row
//! 3. **OutboxRelay polls rows still pending or failed** ← This module
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 5s | How often to look for undelivered rows |
//! | `batch_size` | 100 | Max rows per poll cycle |
//! | `grace_period` | 30s | Pending rows younger than this belong to the fast path |
//! | `max_attempts` | 5 | Attempts before a row is dead-lettered |
//! | `cleanup_interval` | 1h | How often published rows are purged |
//! | `retention_hours` | 72 | Age at which published rows are purged |
//!
//! ## Graceful Shutdown
//!
//! The relay listens for a shutdown signal and completes one final batch
//! before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::OutboxConfig;
use crate::domain::foundation::{DomainError, DomainEvent, Timestamp};
use crate::ports::{EventPublisher, OutboxStore};

/// Configuration for the OutboxRelay service.
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub grace_period: Duration,
    pub max_attempts: u32,
    pub cleanup_interval: Duration,
    pub retention_hours: u32,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            grace_period: Duration::from_secs(30),
            max_attempts: 5,
            cleanup_interval: Duration::from_secs(3600),
            retention_hours: 72,
        }
    }
}

impl OutboxRelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

impl From<&OutboxConfig> for OutboxRelayConfig {
    fn from(config: &OutboxConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size,
            grace_period: config.grace_period(),
            max_attempts: config.max_delivery_attempts,
            cleanup_interval: config.cleanup_interval(),
            retention_hours: config.retention_hours,
        }
    }
}

/// Counts from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub published: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Background service that re-publishes undelivered outbox rows.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    pub fn new(outbox: Arc<dyn OutboxStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_config(outbox, publisher, OutboxRelayConfig::default())
    }

    pub fn with_config(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            outbox,
            publisher,
            config,
        }
    }

    /// Run the relay loop until shutdown signal is received.
    ///
    /// Store errors inside a pass are logged and the loop keeps going.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = time::interval(self.config.poll_interval);
        let mut cleanup = time::interval(self.config.cleanup_interval);
        info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.process_logged().await;
                        info!("Outbox relay stopped");
                        return;
                    }
                }

                _ = poll.tick() => {
                    self.process_logged().await;
                }

                _ = cleanup.tick() => {
                    match self.outbox.cleanup_old(self.config.retention_hours).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "Purged published outbox rows"),
                        Err(err) => warn!(error = %err, "Outbox cleanup failed"),
                    }
                }
            }
        }
    }

    async fn process_logged(&self) {
        if let Err(err) = self.process_batch().await {
            error!(error = %err, "Outbox relay pass failed");
        }
    }

    /// Process a single batch of undelivered rows.
    ///
    /// Rows are handled in creation order, one attempt each. Only a failure
    /// to fetch the batch is returned; bookkeeping errors on single rows are
    /// logged and the batch carries on.
    pub async fn process_batch(&self) -> Result<RelayReport, DomainError> {
        let grace_secs = self.config.grace_period.as_secs();
        let stale_before = Timestamp::now().minus_secs(grace_secs);
        let entries = self
            .outbox
            .get_deliverable(self.config.batch_size, stale_before)
            .await?;
        let mut report = RelayReport::default();

        for entry in entries {
            let event = &entry.event;
            match self.publisher.publish(event).await {
                Ok(()) => {
                    Self::record(entry.id, "published", self.outbox.mark_published(entry.id).await);
                    debug!(outbox_id = %entry.id, event_id = %event.event_id(), "Relay published event");
                    report.published += 1;
                }
                Err(err) => {
                    let attempts = entry.attempts + 1;
                    let message = err.to_string();
                    if !err.is_retryable() || attempts >= self.config.max_attempts {
                        error!(
                            outbox_id = %entry.id,
                            event_id = %event.event_id(),
                            event_type = event.event_type(),
                            attempts,
                            error = %err,
                            "Event dead-lettered"
                        );
                        Self::record(
                            entry.id,
                            "dead-lettered",
                            self.outbox.mark_dead_lettered(entry.id, &message).await,
                        );
                        report.dead_lettered += 1;
                    } else {
                        warn!(
                            outbox_id = %entry.id,
                            event_id = %event.event_id(),
                            attempts,
                            error = %err,
                            "Relay publish failed, will retry"
                        );
                        Self::record(
                            entry.id,
                            "failed",
                            self.outbox.mark_failed(entry.id, &message).await,
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// A row whose status could not be written stays deliverable and is
    /// picked up again on a later pass.
    fn record(id: Uuid, status: &'static str, result: Result<(), DomainError>) {
        if let Err(err) = result {
            error!(outbox_id = %id, status, error = %err, "Failed to record outbox status");
        }
    }

    /// Run exactly one poll cycle (for testing).
    pub async fn poll_once(&self) -> Result<RelayReport, DomainError> {
        self.process_batch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::{BrokerPublisher, InMemoryStreamClient};
    use crate::adapters::memory::InMemoryCommentStore;
    use crate::config::StreamsConfig;
    use crate::domain::comment::{Comment, CommentEvent};
    use crate::domain::foundation::{MemberId, PostId};
    use crate::ports::{CommentStore, IsolationLevel, OutboxEntry, OutboxStatus};

    fn comment() -> Comment {
        Comment::new(
            PostId::new("post-1").unwrap(),
            MemberId::new("member-1").unwrap(),
            "hello",
        )
        .unwrap()
    }

    /// Commits `count` outbox rows aged past the grace period.
    async fn stale_entries(store: &InMemoryCommentStore, count: usize) -> Vec<OutboxEntry> {
        let entries: Vec<OutboxEntry> = (0..count)
            .map(|_| OutboxEntry::new(CommentEvent::created(&comment())))
            .collect();
        let mut tx = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
        tx.write_outbox(&entries).await.unwrap();
        tx.commit().await.unwrap();
        for entry in &entries {
            store
                .backdate_outbox_entry(entry.id, Timestamp::now().minus_secs(120))
                .await;
        }
        entries
    }

    fn relay(
        store: &Arc<InMemoryCommentStore>,
        client: &Arc<InMemoryStreamClient>,
        config: OutboxRelayConfig,
    ) -> OutboxRelay {
        let publisher = Arc::new(BrokerPublisher::new(client.clone(), &StreamsConfig::default()));
        OutboxRelay::with_config(store.clone(), publisher, config)
    }

    #[tokio::test]
    async fn poll_once_publishes_stale_pending_events() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::new());
        stale_entries(&store, 2).await;

        let report = relay(&store, &client, OutboxRelayConfig::default())
            .poll_once()
            .await
            .unwrap();

        assert_eq!(report.published, 2);
        assert_eq!(client.message_count(), 2);
        assert!(store
            .outbox_entries()
            .await
            .iter()
            .all(|e| e.status == OutboxStatus::Published));
    }

    #[tokio::test]
    async fn fresh_pending_events_are_left_to_fast_path() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::new());
        let entry = OutboxEntry::new(CommentEvent::created(&comment()));
        let mut tx = store.begin(IsolationLevel::ReadCommitted).await.unwrap();
        tx.write_outbox(std::slice::from_ref(&entry)).await.unwrap();
        tx.commit().await.unwrap();

        let report = relay(&store, &client, OutboxRelayConfig::default())
            .poll_once()
            .await
            .unwrap();

        assert_eq!(report, RelayReport::default());
        assert_eq!(client.message_count(), 0);
    }

    #[tokio::test]
    async fn poll_once_respects_batch_size() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::new());
        stale_entries(&store, 5).await;
        let relay = relay(&store, &client, OutboxRelayConfig::default().with_batch_size(2));

        assert_eq!(relay.poll_once().await.unwrap().published, 2);
        assert_eq!(relay.poll_once().await.unwrap().published, 2);
        assert_eq!(relay.poll_once().await.unwrap().published, 1);
    }

    #[tokio::test]
    async fn repeated_failures_end_in_dead_letter() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::always_failing());
        stale_entries(&store, 1).await;
        let relay = relay(&store, &client, OutboxRelayConfig::default().with_max_attempts(3));

        assert_eq!(relay.poll_once().await.unwrap().failed, 1);
        assert_eq!(relay.poll_once().await.unwrap().failed, 1);
        assert_eq!(relay.poll_once().await.unwrap().dead_lettered, 1);
        assert_eq!(relay.poll_once().await.unwrap(), RelayReport::default());

        let entries = store.outbox_entries().await;
        assert_eq!(entries[0].status, OutboxStatus::DeadLettered);
        assert_eq!(entries[0].attempts, 3);
    }

    #[tokio::test]
    async fn failed_event_is_delivered_once_stream_recovers() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::always_failing());
        stale_entries(&store, 1).await;
        let relay = relay(&store, &client, OutboxRelayConfig::default());

        relay.poll_once().await.unwrap();
        client.set_failing(false);
        let report = relay.poll_once().await.unwrap();

        assert_eq!(report.published, 1);
        assert_eq!(client.message_count(), 1);
    }

    /// Outbox that refuses to record publication of one row.
    struct StuckRow {
        inner: Arc<InMemoryCommentStore>,
        stuck: Uuid,
    }

    #[async_trait::async_trait]
    impl OutboxStore for StuckRow {
        async fn get_deliverable(
            &self,
            limit: u32,
            stale_before: Timestamp,
        ) -> Result<Vec<OutboxEntry>, DomainError> {
            self.inner.get_deliverable(limit, stale_before).await
        }

        async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
            if id == self.stuck {
                return Err(DomainError::database("connection reset"));
            }
            self.inner.mark_published(id).await
        }

        async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
            self.inner.mark_failed(id, error).await
        }

        async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
            self.inner.mark_dead_lettered(id, error).await
        }

        async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
            self.inner.cleanup_old(older_than_hours).await
        }
    }

    #[tokio::test]
    async fn status_write_failure_does_not_stop_the_batch() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::new());
        let entries = stale_entries(&store, 3).await;
        let outbox = Arc::new(StuckRow {
            inner: store.clone(),
            stuck: entries[0].id,
        });
        let publisher = Arc::new(BrokerPublisher::new(client.clone(), &StreamsConfig::default()));
        let relay = OutboxRelay::with_config(outbox, publisher, OutboxRelayConfig::default());

        let report = relay.poll_once().await.unwrap();

        assert_eq!(report.published, 3);
        assert_eq!(client.message_count(), 3);
        let statuses: Vec<OutboxStatus> =
            store.outbox_entries().await.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![OutboxStatus::Pending, OutboxStatus::Published, OutboxStatus::Published]
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let store = Arc::new(InMemoryCommentStore::new());
        let client = Arc::new(InMemoryStreamClient::new());
        stale_entries(&store, 1).await;
        let config = OutboxRelayConfig::default().with_poll_interval(Duration::from_millis(10));
        let relay = relay(&store, &client, config);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(client.message_count(), 1);
    }

    #[test]
    fn config_defaults_are_reasonable() {
        let config = OutboxRelayConfig::default();

        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.grace_period, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 5);
    }
}
