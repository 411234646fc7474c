//! Transaction scope with commit-gated event buffering.
//!
//! A `TransactionScope` wraps one store transaction and collects the domain
//! events raised while it is open. Nothing leaves the process until the
//! store reports a successful commit:
//!
//! - On commit, buffered events are written to the outbox inside the same
//!   transaction, the transaction commits, and then every registered
//!   `TransactionHook` sees the committed entries in the order they were
//!   buffered.
//! - On rollback (explicit, failed commit, or the scope being dropped) the
//!   buffer is discarded and hooks are told about the discarded events.
//!
//! Hooks run after the store commit has returned, so a hook failure can
//! never undo or fail the business write.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::comment::{CommentError, CommentEvent};
use crate::domain::foundation::DomainEvent;
use crate::ports::{CommentStore, CommentTransaction, IsolationLevel, OutboxEntry};

/// Callbacks fired at the commit boundary.
#[async_trait]
pub trait TransactionHook: Send + Sync {
    /// Called once after a successful commit that carried events.
    ///
    /// Must not block on delivery; hand work off and return.
    async fn after_commit(&self, committed: &[OutboxEntry]);

    /// Called when a transaction that carried events did not commit.
    fn after_rollback(&self, discarded: &[CommentEvent]);
}

/// Opens transaction scopes and owns the hooks they report to.
#[derive(Clone)]
pub struct TransactionManager {
    store: Arc<dyn CommentStore>,
    hooks: Vec<Arc<dyn TransactionHook>>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        Self {
            store,
            hooks: Vec::new(),
        }
    }

    /// Registers a hook for every scope opened after this call.
    pub fn register_hook(&mut self, hook: Arc<dyn TransactionHook>) {
        self.hooks.push(hook);
    }

    pub fn with_hook(mut self, hook: Arc<dyn TransactionHook>) -> Self {
        self.register_hook(hook);
        self
    }

    pub async fn begin(&self, isolation: IsolationLevel) -> Result<TransactionScope, CommentError> {
        let tx = self.store.begin(isolation).await?;
        let scope = TransactionScope {
            id: Uuid::new_v4(),
            isolation,
            tx: Some(tx),
            pending: Vec::new(),
            hooks: self.hooks.clone(),
        };
        debug!(transaction_id = %scope.id, isolation = isolation.as_sql(), "Transaction started");
        Ok(scope)
    }
}

/// One open unit of work.
///
/// Consumed by `commit`, `rollback` or `complete`. Dropping an unfinished
/// scope rolls it back.
pub struct TransactionScope {
    id: Uuid,
    isolation: IsolationLevel,
    tx: Option<Box<dyn CommentTransaction>>,
    pending: Vec<CommentEvent>,
    hooks: Vec<Arc<dyn TransactionHook>>,
}

impl TransactionScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Store handle for reads and writes inside this transaction.
    pub fn store(&mut self) -> Result<&mut (dyn CommentTransaction + 'static), CommentError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| CommentError::infrastructure("Transaction already finished"))
    }

    /// Holds an event until this scope commits.
    pub fn buffer_event(&mut self, event: CommentEvent) {
        debug!(
            transaction_id = %self.id,
            event_type = event.event_type(),
            comment_id = %event.comment_id(),
            "Event buffered until commit"
        );
        self.pending.push(event);
    }

    pub fn pending_events(&self) -> &[CommentEvent] {
        &self.pending
    }

    /// Adds a hook for this scope only.
    pub fn register_hook(&mut self, hook: Arc<dyn TransactionHook>) {
        self.hooks.push(hook);
    }

    /// Commits the transaction, then releases buffered events to the hooks.
    ///
    /// If the outbox write or the commit itself fails, the transaction is
    /// rolled back, rollback hooks fire, and the error is returned.
    pub async fn commit(mut self) -> Result<(), CommentError> {
        let Some(mut tx) = self.tx.take() else {
            return Err(CommentError::infrastructure("Transaction already finished"));
        };
        let events = std::mem::take(&mut self.pending);
        let hooks = std::mem::take(&mut self.hooks);
        let entries: Vec<OutboxEntry> = events.iter().cloned().map(OutboxEntry::new).collect();

        if !entries.is_empty() {
            if let Err(err) = tx.write_outbox(&entries).await {
                warn!(transaction_id = %self.id, error = %err, "Outbox write failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(transaction_id = %self.id, error = %rollback_err, "Rollback failed");
                }
                notify_rollback(&hooks, &events);
                return Err(err.into());
            }
        }

        if let Err(err) = tx.commit().await {
            warn!(transaction_id = %self.id, error = %err, "Commit failed");
            notify_rollback(&hooks, &events);
            return Err(err.into());
        }

        debug!(transaction_id = %self.id, events = entries.len(), "Transaction committed");

        if !entries.is_empty() {
            for hook in &hooks {
                hook.after_commit(&entries).await;
            }
        }
        Ok(())
    }

    /// Discards every write and every buffered event.
    pub async fn rollback(mut self) {
        let events = std::mem::take(&mut self.pending);
        let hooks = std::mem::take(&mut self.hooks);
        if let Some(tx) = self.tx.take() {
            if let Err(err) = tx.rollback().await {
                warn!(transaction_id = %self.id, error = %err, "Rollback failed");
            }
        }
        debug!(transaction_id = %self.id, discarded = events.len(), "Transaction rolled back");
        notify_rollback(&hooks, &events);
    }

    /// Commits on `Ok`, rolls back on `Err`, and passes the result through.
    pub async fn complete<T>(self, result: Result<T, CommentError>) -> Result<T, CommentError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.rollback().await;
                Err(err)
            }
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            warn!(transaction_id = %self.id, "Transaction scope dropped without commit, rolling back");
            let events = std::mem::take(&mut self.pending);
            notify_rollback(&self.hooks, &events);
        }
    }
}

fn notify_rollback(hooks: &[Arc<dyn TransactionHook>], events: &[CommentEvent]) {
    if events.is_empty() {
        return;
    }
    for hook in hooks {
        hook.after_rollback(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCommentStore;
    use crate::domain::comment::Comment;
    use crate::domain::foundation::{MemberId, PostId};
    use crate::ports::{OutboxStatus, OutboxStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHook {
        committed: Mutex<Vec<CommentEvent>>,
        discarded: Mutex<Vec<CommentEvent>>,
    }

    #[async_trait]
    impl TransactionHook for RecordingHook {
        async fn after_commit(&self, committed: &[OutboxEntry]) {
            let mut seen = self.committed.lock().unwrap();
            seen.extend(committed.iter().map(|e| e.event.clone()));
        }

        fn after_rollback(&self, discarded: &[CommentEvent]) {
            self.discarded.lock().unwrap().extend_from_slice(discarded);
        }
    }

    fn comment() -> Comment {
        Comment::new(
            PostId::new("post-1").unwrap(),
            MemberId::new("member-1").unwrap(),
            "hello",
        )
        .unwrap()
    }

    fn setup() -> (Arc<InMemoryCommentStore>, Arc<RecordingHook>, TransactionManager) {
        let store = Arc::new(InMemoryCommentStore::new());
        let hook = Arc::new(RecordingHook::default());
        let manager = TransactionManager::new(store.clone()).with_hook(hook.clone());
        (store, hook, manager)
    }

    #[tokio::test]
    async fn commit_releases_events_in_buffer_order() {
        let (store, hook, manager) = setup();
        let first = comment();
        let second = comment();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.store().unwrap().save(&first).await.unwrap();
        scope.buffer_event(CommentEvent::created(&first));
        scope.buffer_event(CommentEvent::created(&second));
        assert!(hook.committed.lock().unwrap().is_empty());

        scope.commit().await.unwrap();

        let committed = hook.committed.lock().unwrap().clone();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].comment_id(), first.id());
        assert_eq!(committed[1].comment_id(), second.id());
        assert_eq!(store.outbox_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_events_and_writes() {
        let (store, hook, manager) = setup();
        let c = comment();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.store().unwrap().save(&c).await.unwrap();
        scope.buffer_event(CommentEvent::created(&c));
        scope.rollback().await;

        assert!(hook.committed.lock().unwrap().is_empty());
        assert_eq!(hook.discarded.lock().unwrap().len(), 1);
        assert!(store.find_active_by_id(c.id()).await.unwrap().is_none());
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn dropped_scope_behaves_like_rollback() {
        let (store, hook, manager) = setup();
        let c = comment();

        {
            let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
            scope.store().unwrap().save(&c).await.unwrap();
            scope.buffer_event(CommentEvent::created(&c));
        }

        assert_eq!(hook.discarded.lock().unwrap().len(), 1);
        assert!(store.find_active_by_id(c.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_commit_fires_rollback_hooks() {
        let (store, hook, manager) = setup();
        let c = comment();
        store.fail_commits(true);

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.buffer_event(CommentEvent::created(&c));
        let result = scope.commit().await;

        assert!(matches!(result, Err(CommentError::Infrastructure(_))));
        assert!(hook.committed.lock().unwrap().is_empty());
        assert_eq!(hook.discarded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_without_events_skips_hooks() {
        let (store, hook, manager) = setup();
        let c = comment();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.store().unwrap().save(&c).await.unwrap();
        scope.commit().await.unwrap();

        assert!(hook.committed.lock().unwrap().is_empty());
        assert!(store.find_active_by_id(c.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn committed_entries_start_pending() {
        let (store, _hook, manager) = setup();
        let c = comment();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.buffer_event(CommentEvent::created(&c));
        scope.commit().await.unwrap();

        let entries = store.outbox_entries().await;
        assert_eq!(entries[0].status, OutboxStatus::Pending);
        assert_eq!(entries[0].partition_key, c.id().to_string());
        // Too young for the relay.
        let deliverable = store.get_deliverable(10, entries[0].created_at).await.unwrap();
        assert!(deliverable.is_empty());
    }

    #[tokio::test]
    async fn complete_commits_ok_and_rolls_back_err() {
        let (store, _hook, manager) = setup();
        let kept = comment();
        let dropped = comment();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.store().unwrap().save(&kept).await.unwrap();
        scope.complete(Ok(())).await.unwrap();

        let mut scope = manager.begin(IsolationLevel::ReadCommitted).await.unwrap();
        scope.store().unwrap().save(&dropped).await.unwrap();
        let result: Result<(), CommentError> = scope.complete(Err(CommentError::Forbidden)).await;

        assert_eq!(result, Err(CommentError::Forbidden));
        assert!(store.find_active_by_id(kept.id()).await.unwrap().is_some());
        assert!(store.find_active_by_id(dropped.id()).await.unwrap().is_none());
    }
}
