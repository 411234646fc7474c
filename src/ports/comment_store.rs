//! CommentStore port - Transactional persistence for comments and likes.
//!
//! The store is a collaborator: it owns durability, isolation and the
//! `(comment_id, member_id)` uniqueness constraint on likes. Application
//! services only ever mutate state through a `CommentTransaction`, so every
//! write can be paired with its outbox rows and committed or rolled back as
//! one unit.

use async_trait::async_trait;

use crate::domain::comment::{Comment, LikeRecord, Page, PageRequest};
use crate::domain::foundation::{CommentId, DomainError, MemberId, PostId};

use super::OutboxEntry;

/// Transaction isolation level requested by a write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Each statement sees only data committed before it began.
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Port for comment persistence.
///
/// Read methods run outside any transaction and see committed data only.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Opens a new transaction at the given isolation level.
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn CommentTransaction>, DomainError>;

    /// Finds a comment that is not soft-deleted.
    async fn find_active_by_id(&self, id: &CommentId) -> Result<Option<Comment>, DomainError>;

    /// Lists active comments on a post.
    async fn find_by_post_id(
        &self,
        post_id: &PostId,
        request: PageRequest,
    ) -> Result<Page<Comment>, DomainError>;

    /// Counts likes on a comment.
    async fn count_likes(&self, comment_id: &CommentId) -> Result<u64, DomainError>;

    /// Checks whether the member has liked the comment.
    async fn exists_like(
        &self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError>;
}

/// A single open transaction against the store.
///
/// Dropping a transaction without calling `commit` must discard every
/// write made through it.
#[async_trait]
pub trait CommentTransaction: Send {
    /// Finds an active comment as seen by this transaction.
    async fn find_active_by_id(&mut self, id: &CommentId)
        -> Result<Option<Comment>, DomainError>;

    /// Inserts or replaces a comment.
    async fn save(&mut self, comment: &Comment) -> Result<(), DomainError>;

    /// Checks whether the member has liked the comment.
    async fn exists_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError>;

    /// Inserts a like record.
    ///
    /// # Errors
    ///
    /// Returns `ErrorCode::DuplicateLike` when the pair already exists.
    /// Stores may also report the violation from `commit` if it is only
    /// detected there.
    async fn insert_like(&mut self, like: &LikeRecord) -> Result<(), DomainError>;

    /// Deletes a like record. Returns `false` if none existed.
    async fn delete_like(
        &mut self,
        comment_id: &CommentId,
        member_id: &MemberId,
    ) -> Result<bool, DomainError>;

    /// Writes outbox rows as part of this transaction.
    async fn write_outbox(&mut self, entries: &[OutboxEntry]) -> Result<(), DomainError>;

    /// Makes every write durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards every write.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn CommentStore, _: &dyn CommentTransaction) {}

    #[test]
    fn default_isolation_is_read_committed() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
    }
}
