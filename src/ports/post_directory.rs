//! PostDirectory port - Lookup against the service that owns posts.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PostId};

/// Port for confirming that a post exists before commenting on it.
///
/// Calls go to another service and may be slow, so the comment service
/// runs them on the outbound worker pool, outside any transaction.
#[async_trait]
pub trait PostDirectory: Send + Sync {
    async fn post_exists(&self, post_id: &PostId) -> Result<bool, DomainError>;
}
