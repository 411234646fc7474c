//! Comment aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CommentId, MemberId, OwnedByMember, PostId, Timestamp, ValidationError,
};

use super::CommentError;

/// Maximum number of characters a comment body may hold.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// A member's comment on a post.
///
/// # Invariants
///
/// - `is_deleted` implies `deleted_at` is set
/// - content cannot change once the comment is soft-deleted
/// - `author_id` never changes after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    id: CommentId,
    post_id: PostId,
    author_id: MemberId,
    content: String,
    is_blind: bool,
    is_deleted: bool,
    deleted_at: Option<Timestamp>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Comment {
    /// Creates a new comment with a fresh server-generated id.
    pub fn new(
        post_id: PostId,
        author_id: MemberId,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let content = validate_content(content.into())?;
        let now = Timestamp::now();
        Ok(Self {
            id: CommentId::new(),
            post_id,
            author_id,
            content,
            is_blind: false,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a comment from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: CommentId,
        post_id: PostId,
        author_id: MemberId,
        content: String,
        is_blind: bool,
        is_deleted: bool,
        deleted_at: Option<Timestamp>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            post_id,
            author_id,
            content,
            is_blind,
            is_deleted,
            deleted_at,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &CommentId {
        &self.id
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    pub fn author_id(&self) -> &MemberId {
        &self.author_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_blind(&self) -> bool {
        self.is_blind
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn deleted_at(&self) -> Option<&Timestamp> {
        self.deleted_at.as_ref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    /// Replaces the comment body.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the comment is soft-deleted
    /// - `Validation` if the new content is empty or too long
    pub fn update_content(&mut self, content: impl Into<String>) -> Result<(), CommentError> {
        if self.is_deleted {
            return Err(CommentError::NotFound(self.id));
        }
        self.content = validate_content(content.into())?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Marks the comment deleted. It stays in storage but drops out of
    /// every active lookup.
    pub fn soft_delete(&mut self) -> Result<(), CommentError> {
        if self.is_deleted {
            return Err(CommentError::NotFound(self.id));
        }
        let now = Timestamp::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

impl OwnedByMember for Comment {
    fn owner_id(&self) -> &MemberId {
        &self.author_id
    }
}

fn validate_content(content: String) -> Result<String, ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::empty_field("content"));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(ValidationError::too_long("content", MAX_CONTENT_CHARS, chars));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment() -> Comment {
        Comment::new(
            PostId::new("P1").unwrap(),
            MemberId::new("M1").unwrap(),
            "hi",
        )
        .unwrap()
    }

    #[test]
    fn new_comment_is_active() {
        let c = comment();
        assert!(!c.is_deleted());
        assert!(!c.is_blind());
        assert!(c.deleted_at().is_none());
        assert_eq!(c.content(), "hi");
    }

    #[test]
    fn new_comment_rejects_blank_content() {
        let result = Comment::new(
            PostId::new("P1").unwrap(),
            MemberId::new("M1").unwrap(),
            "   ",
        );
        assert_eq!(result.unwrap_err(), ValidationError::empty_field("content"));
    }

    #[test]
    fn new_comment_rejects_oversized_content() {
        let long = "x".repeat(MAX_CONTENT_CHARS + 1);
        let result = Comment::new(
            PostId::new("P1").unwrap(),
            MemberId::new("M1").unwrap(),
            long,
        );
        assert!(matches!(result, Err(ValidationError::TooLong { .. })));
    }

    #[test]
    fn soft_delete_sets_deleted_at() {
        let mut c = comment();
        c.soft_delete().unwrap();

        assert!(c.is_deleted());
        assert!(c.deleted_at().is_some());
    }

    #[test]
    fn update_after_delete_is_not_found() {
        let mut c = comment();
        c.soft_delete().unwrap();

        let err = c.update_content("edited").unwrap_err();
        assert_eq!(err, CommentError::NotFound(*c.id()));
        assert_eq!(c.content(), "hi");
    }

    #[test]
    fn second_delete_is_not_found() {
        let mut c = comment();
        c.soft_delete().unwrap();
        assert!(matches!(c.soft_delete(), Err(CommentError::NotFound(_))));
    }

    #[test]
    fn update_content_replaces_body() {
        let mut c = comment();
        c.update_content("edited").unwrap();
        assert_eq!(c.content(), "edited");
    }

    #[test]
    fn author_owns_comment() {
        let c = comment();
        assert!(c.is_owner(&MemberId::new("M1").unwrap()));
        assert!(!c.is_owner(&MemberId::new("M2").unwrap()));
    }
}
