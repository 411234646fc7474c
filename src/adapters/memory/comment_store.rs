//! In-memory comment store for tests and local runs.
//!
//! Transactions stage their writes privately and apply them atomically on
//! commit, which gives READ COMMITTED visibility: a transaction sees its own
//! writes plus whatever other transactions have committed. The like
//! uniqueness constraint is checked again at commit time, so two
//! transactions racing to insert the same like end with exactly one
//! `DuplicateLike`. Likewise a staged write to a comment that another
//! transaction soft-deleted in the meantime fails at commit with
//! `CommentNotFound`, so a deleted comment never comes back.
//!
//! The same value also serves as the `OutboxStore`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::comment::{Comment, CommentSort, LikeRecord, Page, PageRequest};
use crate::domain::foundation::{
    CommentId, DomainError, ErrorCode, MemberId, PostId, Timestamp,
};
use crate::ports::{
    CommentStore, CommentTransaction, IsolationLevel, OutboxEntry, OutboxStatus, OutboxStore,
};

type LikeKey = (CommentId, MemberId);

#[derive(Default)]
struct State {
    comments: HashMap<CommentId, Comment>,
    likes: HashMap<LikeKey, LikeRecord>,
    outbox: Vec<OutboxEntry>,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryCommentStore {
    state: Arc<RwLock<State>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail with a database error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Inserts a comment directly, bypassing transactions.
    pub async fn insert_comment(&self, comment: Comment) {
        self.state
            .write()
            .await
            .comments
            .insert(*comment.id(), comment);
    }

    /// Snapshot of every outbox row in write order.
    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.clone()
    }

    /// Moves an outbox row's creation time, e.g. to age it past the relay
    /// grace period.
    pub async fn backdate_outbox_entry(&self, id: Uuid, created_at: Timestamp) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.created_at = created_at;
        }
    }

    async fn update_outbox<F>(&self, id: Uuid, update: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut OutboxEntry) + Send,
    {
        let mut state = self.state.write().await;
        let entry = state.outbox.iter_mut().find(|e| e.id == id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::OutboxEntryNotFound,
                format!("Outbox entry not found: {}", id),
            )
        })?;
        update(entry);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn CommentTransaction>, DomainError> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
            isolation,
            saved: HashMap::new(),
            inserted_likes: Vec::new(),
            deleted_likes: Vec::new(),
            outbox: Vec::new(),
        }))
    }

    async fn find_active_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError> {
        let state = self.state.read().await;
        Ok(state.comments.get(id).filter(|c| !c.is_deleted()).cloned())
    }

    async fn find_by_post_id(
        &self,
        post_id: &PostId,
        request: PageRequest,
    ) -> Result<Page<Comment>, DomainError> {
        let state = self.state.read().await;
        let mut matching: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id() == post_id && !c.is_deleted())
            .cloned()
            .collect();

        matching.sort_by(|a, b| match request.sort {
            CommentSort::Latest => b.created_at().cmp(a.created_at()),
            CommentSort::Oldest => a.created_at().cmp(b.created_at()),
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Ok(Page::new(items, request, total))
    }

    async fn count_likes(&self, comment_id: &CommentId) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.likes.keys().filter(|(c, _)| c == comment_id).count() as u64)
    }

    async fn exists_like(
        &self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        let state = self.state.read().await;
        Ok(state.likes.contains_key(&(*comment_id, member_id.clone())))
    }
}

#[async_trait]
impl OutboxStore for InMemoryCommentStore {
    async fn get_deliverable(
        &self,
        limit: u32,
        stale_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.is_deliverable(&stale_before))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        self.update_outbox(id, |e| e.mark_published()).await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        let error = error.to_string();
        self.update_outbox(id, move |e| e.mark_failed(error)).await
    }

    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        let error = error.to_string();
        self.update_outbox(id, move |e| e.mark_dead_lettered(error)).await
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let cutoff = Timestamp::now().minus_hours(older_than_hours);
        let mut state = self.state.write().await;
        let before = state.outbox.len();
        state.outbox.retain(|e| {
            !(e.status == OutboxStatus::Published
                && e.processed_at.map(|at| at.is_before(&cutoff)).unwrap_or(false))
        });
        Ok((before - state.outbox.len()) as u64)
    }
}

/// Open transaction over `InMemoryCommentStore`.
pub struct InMemoryTransaction {
    state: Arc<RwLock<State>>,
    fail_commit: bool,
    #[allow(dead_code)]
    isolation: IsolationLevel,
    saved: HashMap<CommentId, Comment>,
    inserted_likes: Vec<LikeRecord>,
    deleted_likes: Vec<LikeKey>,
    outbox: Vec<OutboxEntry>,
}

impl InMemoryTransaction {
    fn staged_insert(&self, key: &LikeKey) -> Option<usize> {
        self.inserted_likes.iter().position(|l| &l.key() == key)
    }

    fn staged_delete(&self, key: &LikeKey) -> bool {
        self.deleted_likes.contains(key)
    }

    fn duplicate_like(key: &LikeKey) -> DomainError {
        DomainError::new(ErrorCode::DuplicateLike, "Comment already liked by this member")
            .with_detail("comment_id", key.0.to_string())
            .with_detail("member_id", key.1.to_string())
    }
}

#[async_trait]
impl CommentTransaction for InMemoryTransaction {
    async fn find_active_by_id(
        &mut self,
        id: &CommentId,
    ) -> Result<Option<Comment>, DomainError> {
        let found = match self.saved.get(id) {
            Some(staged) => Some(staged.clone()),
            None => self.state.read().await.comments.get(id).cloned(),
        };
        Ok(found.filter(|c| !c.is_deleted()))
    }

    async fn save(&mut self, comment: &Comment) -> Result<(), DomainError> {
        self.saved.insert(*comment.id(), comment.clone());
        Ok(())
    }

    async fn exists_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        let key = (*comment_id, member_id.clone());
        if self.staged_insert(&key).is_some() {
            return Ok(true);
        }
        if self.staged_delete(&key) {
            return Ok(false);
        }
        Ok(self.state.read().await.likes.contains_key(&key))
    }

    async fn insert_like(&mut self, like: &LikeRecord) -> Result<(), DomainError> {
        let key = like.key();
        let committed = self.state.read().await.likes.contains_key(&key);
        if self.staged_insert(&key).is_some() || (committed && !self.staged_delete(&key)) {
            return Err(Self::duplicate_like(&key));
        }
        self.inserted_likes.push(like.clone());
        Ok(())
    }

    async fn delete_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError> {
        let key = (*comment_id, member_id.clone());
        if let Some(index) = self.staged_insert(&key) {
            self.inserted_likes.remove(index);
            return Ok(true);
        }
        if self.staged_delete(&key) {
            return Ok(false);
        }
        let committed = self.state.read().await.likes.contains_key(&key);
        if committed {
            self.deleted_likes.push(key);
        }
        Ok(committed)
    }

    async fn write_outbox(&mut self, entries: &[OutboxEntry]) -> Result<(), DomainError> {
        self.outbox.extend_from_slice(entries);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        if self.fail_commit {
            return Err(DomainError::database("Simulated commit failure"));
        }

        let this = *self;
        let mut state = this.state.write().await;

        for id in this.saved.keys() {
            if state.comments.get(id).is_some_and(|c| c.is_deleted()) {
                return Err(DomainError::comment_not_found(id));
            }
        }

        for like in &this.inserted_likes {
            let key = like.key();
            if state.likes.contains_key(&key) && !this.deleted_likes.contains(&key) {
                return Err(Self::duplicate_like(&key));
            }
        }

        for key in &this.deleted_likes {
            state.likes.remove(key);
        }
        for like in this.inserted_likes {
            state.likes.insert(like.key(), like);
        }
        for (id, comment) in this.saved {
            state.comments.insert(id, comment);
        }
        state.outbox.extend(this.outbox);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
