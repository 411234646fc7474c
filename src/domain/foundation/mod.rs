//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event plumbing and error types
//! that form the vocabulary of the comment domain.

mod errors;
mod events;
mod ids;
mod ownership;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{domain_event, DomainEvent, EventId};
pub use ids::{CommentId, MemberId, PostId};
pub use ownership::OwnedByMember;
pub use timestamp::Timestamp;
