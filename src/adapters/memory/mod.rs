//! In-memory persistence.
//!
//! - `InMemoryCommentStore` - Comments, likes and outbox rows with
//!   commit-time visibility, used by tests and the local profile

mod comment_store;

pub use comment_store::{InMemoryCommentStore, InMemoryTransaction};
