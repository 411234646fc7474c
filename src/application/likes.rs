//! Comment like commands and queries.
//!
//! At most one like exists per `(comment, member)` pair. The service checks
//! for an existing like inside the transaction, but two concurrent requests
//! can both pass that check under READ COMMITTED. The store's uniqueness
//! constraint settles the race: whichever request loses sees
//! `DuplicateLike`, whether the store reports it on insert or on commit.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::comment::{CommentError, LikeRecord};
use crate::domain::foundation::{CommentId, MemberId};
use crate::ports::{CommentStore, IsolationLevel};

use super::transaction::{TransactionManager, TransactionScope};

#[derive(Debug, Clone)]
pub struct LikeCommand {
    pub comment_id: CommentId,
    pub member_id: MemberId,
}

pub struct CommentLikeService {
    store: Arc<dyn CommentStore>,
    transactions: TransactionManager,
}

impl CommentLikeService {
    pub fn new(store: Arc<dyn CommentStore>, transactions: TransactionManager) -> Self {
        Self {
            store,
            transactions,
        }
    }

    /// Records a like.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the comment is missing or deleted
    /// - `DuplicateLike` if the member already liked it, including when a
    ///   concurrent like committed first
    pub async fn like(&self, cmd: LikeCommand) -> Result<LikeRecord, CommentError> {
        if self.store.find_active_by_id(&cmd.comment_id).await?.is_none() {
            return Err(CommentError::NotFound(cmd.comment_id));
        }

        let mut scope = self.transactions.begin(IsolationLevel::ReadCommitted).await?;
        let result = Self::insert_like(&mut scope, cmd).await;
        let like = scope.complete(result).await?;

        info!(comment_id = %like.comment_id, member_id = %like.member_id, "Comment liked");
        Ok(like)
    }

    async fn insert_like(scope: &mut TransactionScope, cmd: LikeCommand) -> Result<LikeRecord, CommentError> {
        let tx = scope.store()?;
        if tx.exists_like(&cmd.comment_id, &cmd.member_id).await? {
            warn!(comment_id = %cmd.comment_id, member_id = %cmd.member_id, "Comment already liked");
            return Err(CommentError::DuplicateLike);
        }

        let like = LikeRecord::new(cmd.comment_id, cmd.member_id);
        tx.insert_like(&like).await?;
        Ok(like)
    }

    /// Removes a like.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the comment is missing or deleted
    /// - `LikeNotFound` if the member had not liked it
    pub async fn unlike(&self, cmd: LikeCommand) -> Result<(), CommentError> {
        if self.store.find_active_by_id(&cmd.comment_id).await?.is_none() {
            return Err(CommentError::NotFound(cmd.comment_id));
        }

        let mut scope = self.transactions.begin(IsolationLevel::ReadCommitted).await?;
        let result = Self::delete_like(&mut scope, &cmd).await;
        scope.complete(result).await?;

        info!(comment_id = %cmd.comment_id, member_id = %cmd.member_id, "Comment unliked");
        Ok(())
    }

    async fn delete_like(scope: &mut TransactionScope, cmd: &LikeCommand) -> Result<(), CommentError> {
        let removed = scope
            .store()?
            .delete_like(&cmd.comment_id, &cmd.member_id)
            .await?;
        if removed {
            Ok(())
        } else {
            Err(CommentError::LikeNotFound)
        }
    }

    pub async fn count_likes(&self, comment_id: &CommentId) -> Result<u64, CommentError> {
        Ok(self.store.count_likes(comment_id).await?)
    }

    pub async fn has_liked(&self, comment_id: &CommentId, member_id: &MemberId) -> Result<bool, CommentError> {
        Ok(self.store.exists_like(comment_id, member_id).await?)
    }
}
