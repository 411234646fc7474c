//! Like records.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CommentId, MemberId, Timestamp};

/// A member's like on a comment.
///
/// Identity is the `(comment_id, member_id)` pair. There is no update:
/// the record either exists (liked) or it does not (unliked). Uniqueness
/// of the pair is enforced by the store, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub comment_id: CommentId,
    pub member_id: MemberId,
    pub created_at: Timestamp,
}

impl LikeRecord {
    pub fn new(comment_id: CommentId, member_id: MemberId) -> Self {
        Self {
            comment_id,
            member_id,
            created_at: Timestamp::now(),
        }
    }

    /// Returns the identity pair of this record.
    pub fn key(&self) -> (CommentId, MemberId) {
        (self.comment_id, self.member_id.clone())
    }
}
