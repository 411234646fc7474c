//! Ownership trait for member-owned resources.
//!
//! Comments can only be edited or deleted by the member who wrote them.
//! Aggregates implement `OwnedByMember` and handlers call
//! `check_ownership()` before applying a mutation.
//!
//! # Example
//!
//! ```ignore
//! impl OwnedByMember for Comment {
//!     fn owner_id(&self) -> &MemberId {
//!         &self.author_id
//!     }
//! }
//!
//! // In a handler:
//! comment.check_ownership(&cmd.member_id)?;  // Err(Forbidden) if not owner
//! ```

use super::{DomainError, ErrorCode, MemberId};

/// Trait for aggregates that have a single owning member.
pub trait OwnedByMember {
    /// Returns the ID of the member who owns this resource.
    fn owner_id(&self) -> &MemberId;

    /// Checks if the given member is the owner.
    fn is_owner(&self, member_id: &MemberId) -> bool {
        self.owner_id() == member_id
    }

    /// Validates ownership, returning a `Forbidden` error if the member is
    /// not the owner.
    fn check_ownership(&self, member_id: &MemberId) -> Result<(), DomainError> {
        if self.is_owner(member_id) {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::Forbidden,
                "Member does not own this resource",
            )
            .with_detail("owner_id", self.owner_id().to_string())
            .with_detail("requested_by", member_id.to_string()))
        }
    }
}
