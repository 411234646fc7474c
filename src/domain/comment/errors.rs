//! Comment-specific error types.

use thiserror::Error;

use crate::domain::foundation::{CommentId, DomainError, ErrorCode, PostId, ValidationError};

/// Errors returned by comment and like operations.
///
/// Everything except `Infrastructure` is an expected business outcome and
/// is handed straight back to the caller of the write operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    /// Comment does not exist or is soft-deleted.
    #[error("Comment not found: {0}")]
    NotFound(CommentId),

    /// Unlike was requested but the member never liked the comment.
    #[error("Like not found")]
    LikeNotFound,

    /// Caller does not own the comment.
    #[error("Permission denied")]
    Forbidden,

    /// Member already liked this comment.
    #[error("Comment already liked by this member")]
    DuplicateLike,

    /// Target post does not exist (or could not be confirmed).
    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An event was buffered outside a transaction with fallback disabled.
    #[error("No active transaction to attach the event to")]
    NoActiveTransactionContext,

    #[error("Error: {0}")]
    Infrastructure(String),
}

impl CommentError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        CommentError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CommentError::NotFound(_) => ErrorCode::CommentNotFound,
            CommentError::LikeNotFound => ErrorCode::LikeNotFound,
            CommentError::Forbidden => ErrorCode::Forbidden,
            CommentError::DuplicateLike => ErrorCode::DuplicateLike,
            CommentError::PostNotFound(_) => ErrorCode::PostNotFound,
            CommentError::Validation(_) => ErrorCode::ValidationFailed,
            CommentError::NoActiveTransactionContext => ErrorCode::TransactionClosed,
            CommentError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<DomainError> for CommentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::Forbidden => CommentError::Forbidden,
            ErrorCode::DuplicateLike => CommentError::DuplicateLike,
            ErrorCode::LikeNotFound => CommentError::LikeNotFound,
            ErrorCode::CommentNotFound => match err
                .details
                .get("comment_id")
                .and_then(|id| id.parse().ok())
            {
                Some(id) => CommentError::NotFound(id),
                None => CommentError::Infrastructure(err.to_string()),
            },
            ErrorCode::ValidationFailed => CommentError::Validation(
                ValidationError::invalid_format("request", err.message),
            ),
            _ => CommentError::Infrastructure(err.to_string()),
        }
    }
}
