//! Service assembly.
//!
//! `ServiceRuntime` wires stores, publishers, pools and services together
//! from configuration. The binary builds it over PostgreSQL, Redis and the
//! post service; tests build it over the in-memory adapters.

use std::sync::Arc;

use tracing::info;

use crate::adapters::events::{BrokerPublisher, OutboxRelay, OutboxRelayConfig};
use crate::application::{
    CommentLikeService, CommentService, EventDispatcher, EventEmitter, TransactionManager,
    WorkerPool,
};
use crate::config::{AppConfig, DispatchConfig, OutboxConfig, StreamsConfig};
use crate::ports::{CommentStore, EventPublisher, OutboxStore, PostDirectory, StreamClient};

/// The configuration sections the runtime needs.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    pub dispatch: DispatchConfig,
    pub streams: StreamsConfig,
    pub outbox: OutboxConfig,
}

impl From<&AppConfig> for RuntimeSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            dispatch: config.dispatch.clone(),
            streams: config.streams.clone(),
            outbox: config.outbox.clone(),
        }
    }
}

/// Fully wired comment service.
pub struct ServiceRuntime {
    comments: Arc<CommentService>,
    likes: Arc<CommentLikeService>,
    relay: Arc<OutboxRelay>,
    event_pool: WorkerPool,
    outbound_pool: WorkerPool,
}

impl ServiceRuntime {
    /// Builds every component over the given store and external clients.
    ///
    /// The store backs both comment persistence and outbox bookkeeping.
    pub fn build<S>(
        settings: &RuntimeSettings,
        store: Arc<S>,
        stream: Arc<dyn StreamClient>,
        posts: Arc<dyn PostDirectory>,
    ) -> Self
    where
        S: CommentStore + OutboxStore + 'static,
    {
        let comment_store: Arc<dyn CommentStore> = store.clone();
        let outbox_store: Arc<dyn OutboxStore> = store;

        let event_pool = WorkerPool::new(
            settings.dispatch.event_pool.name.clone(),
            settings.dispatch.event_pool.to_pool_config(),
        );
        let outbound_pool = WorkerPool::new(
            settings.dispatch.outbound_pool.name.clone(),
            settings.dispatch.outbound_pool.to_pool_config(),
        );

        let publisher: Arc<dyn EventPublisher> =
            Arc::new(BrokerPublisher::new(stream, &settings.streams));
        let dispatcher = Arc::new(EventDispatcher::with_retry(
            Arc::clone(&publisher),
            Arc::clone(&outbox_store),
            settings.dispatch.retry.to_policy(),
        ));
        let emitter = Arc::new(
            EventEmitter::new(event_pool.clone(), dispatcher)
                .with_fallback_execution(settings.dispatch.fallback_execution),
        );

        let transactions = TransactionManager::new(Arc::clone(&comment_store))
            .with_hook(emitter.clone());

        let comments = Arc::new(CommentService::new(
            Arc::clone(&comment_store),
            transactions.clone(),
            emitter,
            posts,
            outbound_pool.clone(),
        ));
        let likes = Arc::new(CommentLikeService::new(comment_store, transactions));
        let relay = Arc::new(OutboxRelay::with_config(
            outbox_store,
            publisher,
            OutboxRelayConfig::from(&settings.outbox),
        ));

        info!(
            event_pool = event_pool.name(),
            outbound_pool = outbound_pool.name(),
            "Comment service runtime assembled"
        );

        Self {
            comments,
            likes,
            relay,
            event_pool,
            outbound_pool,
        }
    }

    pub fn comments(&self) -> Arc<CommentService> {
        Arc::clone(&self.comments)
    }

    pub fn likes(&self) -> Arc<CommentLikeService> {
        Arc::clone(&self.likes)
    }

    pub fn relay(&self) -> Arc<OutboxRelay> {
        Arc::clone(&self.relay)
    }

    pub fn event_pool(&self) -> &WorkerPool {
        &self.event_pool
    }

    pub fn outbound_pool(&self) -> &WorkerPool {
        &self.outbound_pool
    }

    /// Drains both pools. Queued deliveries run to completion first.
    pub async fn shutdown(&self) {
        self.event_pool.shutdown().await;
        self.outbound_pool.shutdown().await;
        info!("Worker pools drained");
    }
}
