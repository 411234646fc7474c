//! EventEmitter - Bridges the commit boundary to the dispatch pool.
//!
//! Application services call `buffer_event` while their transaction is
//! open. The emitter is registered as a `TransactionHook`, so once the
//! store commits it hands each committed event to the event worker pool
//! and returns without waiting for delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::domain::comment::{CommentError, CommentEvent};
use crate::domain::foundation::DomainEvent;
use crate::ports::OutboxEntry;

use super::dispatch::{Delivery, EventDispatcher};
use super::transaction::{TransactionHook, TransactionScope};
use super::worker_pool::WorkerPool;

pub struct EventEmitter {
    pool: WorkerPool,
    dispatcher: Arc<EventDispatcher>,
    fallback_execution: bool,
}

impl EventEmitter {
    /// Creates an emitter that dispatches immediately when no transaction
    /// is active.
    pub fn new(pool: WorkerPool, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            pool,
            dispatcher,
            fallback_execution: true,
        }
    }

    /// When disabled, buffering outside a transaction is an error.
    pub fn with_fallback_execution(mut self, enabled: bool) -> Self {
        self.fallback_execution = enabled;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Attaches an event to the active transaction.
    ///
    /// # Errors
    ///
    /// `NoActiveTransactionContext` when `scope` is `None` and fallback
    /// execution is disabled.
    pub async fn buffer_event(
        &self,
        scope: Option<&mut TransactionScope>,
        event: CommentEvent,
    ) -> Result<(), CommentError> {
        match scope {
            Some(scope) => {
                scope.buffer_event(event);
                Ok(())
            }
            None if self.fallback_execution => {
                debug!(
                    event_type = event.event_type(),
                    comment_id = %event.comment_id(),
                    "No active transaction, dispatching immediately"
                );
                self.submit(Delivery::untracked(event)).await;
                Ok(())
            }
            None => Err(CommentError::NoActiveTransactionContext),
        }
    }

    async fn submit(&self, delivery: Delivery) {
        let event_id = delivery.event.event_id();
        let dispatcher = Arc::clone(&self.dispatcher);
        let task = async move {
            dispatcher.deliver(delivery).await;
        };
        if let Err(err) = self.pool.submit(task).await {
            error!(
                event_id = %event_id,
                error = %err,
                "Dispatch pool refused event, leaving it to the outbox relay"
            );
        }
    }
}

#[async_trait]
impl TransactionHook for EventEmitter {
    async fn after_commit(&self, committed: &[OutboxEntry]) {
        for entry in committed {
            self.submit(Delivery::from_entry(entry)).await;
        }
    }

    fn after_rollback(&self, discarded: &[CommentEvent]) {
        for event in discarded {
            warn!(
                event_type = event.event_type(),
                event_id = %event.event_id(),
                comment_id = %event.comment_id(),
                "Transaction rolled back, event discarded"
            );
        }
    }
}
