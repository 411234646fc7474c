//! Comment commands and queries.
//!
//! Every write runs in a READ COMMITTED transaction and raises its event
//! through the `EventEmitter`, so an event is only ever published for a
//! change that actually committed. The post existence check is a call to
//! another service and runs on the outbound pool before the transaction
//! opens.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::comment::{Comment, CommentError, CommentEvent, Page, PageRequest};
use crate::domain::foundation::{CommentId, MemberId, OwnedByMember, PostId};
use crate::ports::{CommentStore, IsolationLevel, PostDirectory};

use super::emitter::EventEmitter;
use super::transaction::{TransactionManager, TransactionScope};
use super::worker_pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub post_id: PostId,
    pub member_id: MemberId,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentCommand {
    pub comment_id: CommentId,
    pub member_id: MemberId,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DeleteCommentCommand {
    pub comment_id: CommentId,
    pub member_id: MemberId,
}

pub struct CommentService {
    store: Arc<dyn CommentStore>,
    transactions: TransactionManager,
    emitter: Arc<EventEmitter>,
    posts: Arc<dyn PostDirectory>,
    outbound: WorkerPool,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        transactions: TransactionManager,
        emitter: Arc<EventEmitter>,
        posts: Arc<dyn PostDirectory>,
        outbound: WorkerPool,
    ) -> Self {
        Self {
            store,
            transactions,
            emitter,
            posts,
            outbound,
        }
    }

    /// Writes a new comment and raises `comment.created` on commit.
    ///
    /// # Errors
    ///
    /// - `PostNotFound` if the post is missing or could not be confirmed
    /// - `Validation` for blank or oversized content
    pub async fn create_comment(&self, cmd: CreateCommentCommand) -> Result<Comment, CommentError> {
        self.ensure_post_exists(&cmd.post_id).await?;
        let comment = Comment::new(cmd.post_id, cmd.member_id, cmd.content)?;

        let mut scope = self.transactions.begin(IsolationLevel::ReadCommitted).await?;
        let result = self.insert(&mut scope, comment).await;
        let comment = scope.complete(result).await?;

        info!(comment_id = %comment.id(), post_id = %comment.post_id(), "Comment created");
        Ok(comment)
    }

    async fn insert(&self, scope: &mut TransactionScope, comment: Comment) -> Result<Comment, CommentError> {
        scope.store()?.save(&comment).await?;
        self.emitter
            .buffer_event(Some(scope), CommentEvent::created(&comment))
            .await?;
        Ok(comment)
    }

    /// Replaces the content of a comment the member owns.
    ///
    /// Content edits raise no event.
    pub async fn update_comment(&self, cmd: UpdateCommentCommand) -> Result<Comment, CommentError> {
        let mut scope = self.transactions.begin(IsolationLevel::ReadCommitted).await?;
        let result = Self::apply_update(&mut scope, cmd).await;
        let comment = scope.complete(result).await?;

        info!(comment_id = %comment.id(), "Comment updated");
        Ok(comment)
    }

    async fn apply_update(
        scope: &mut TransactionScope,
        cmd: UpdateCommentCommand,
    ) -> Result<Comment, CommentError> {
        let tx = scope.store()?;
        let mut comment = tx
            .find_active_by_id(&cmd.comment_id)
            .await?
            .ok_or(CommentError::NotFound(cmd.comment_id))?;
        comment.check_ownership(&cmd.member_id)?;
        comment.update_content(cmd.content)?;
        tx.save(&comment).await?;
        Ok(comment)
    }

    /// Soft-deletes a comment the member owns and raises `comment.deleted`
    /// on commit.
    pub async fn delete_comment(&self, cmd: DeleteCommentCommand) -> Result<(), CommentError> {
        let comment_id = cmd.comment_id;
        let mut scope = self.transactions.begin(IsolationLevel::ReadCommitted).await?;
        let result = self.apply_delete(&mut scope, cmd).await;
        scope.complete(result).await?;

        info!(comment_id = %comment_id, "Comment deleted");
        Ok(())
    }

    async fn apply_delete(
        &self,
        scope: &mut TransactionScope,
        cmd: DeleteCommentCommand,
    ) -> Result<(), CommentError> {
        let tx = scope.store()?;
        let mut comment = tx
            .find_active_by_id(&cmd.comment_id)
            .await?
            .ok_or(CommentError::NotFound(cmd.comment_id))?;
        comment.check_ownership(&cmd.member_id)?;
        comment.soft_delete()?;
        tx.save(&comment).await?;

        self.emitter
            .buffer_event(Some(scope), CommentEvent::deleted(&comment))
            .await
    }

    pub async fn get_comment(&self, id: &CommentId) -> Result<Comment, CommentError> {
        self.store
            .find_active_by_id(id)
            .await?
            .ok_or(CommentError::NotFound(*id))
    }

    pub async fn list_comments(
        &self,
        post_id: &PostId,
        request: PageRequest,
    ) -> Result<Page<Comment>, CommentError> {
        Ok(self.store.find_by_post_id(post_id, request).await?)
    }

    async fn ensure_post_exists(&self, post_id: &PostId) -> Result<(), CommentError> {
        let posts = Arc::clone(&self.posts);
        let id = post_id.clone();
        let checked = self
            .outbound
            .call(async move { posts.post_exists(&id).await })
            .await;

        match checked {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(CommentError::PostNotFound(post_id.clone())),
            Ok(Err(err)) => {
                error!(post_id = %post_id, error = %err, "Post lookup failed");
                Err(CommentError::PostNotFound(post_id.clone()))
            }
            Err(err) => {
                error!(post_id = %post_id, error = %err, "Post lookup could not run");
                Err(CommentError::PostNotFound(post_id.clone()))
            }
        }
    }
}
