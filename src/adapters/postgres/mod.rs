//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresCommentStore` - Comments, likes and the event outbox, with
//!   transactions at a caller-chosen isolation level

mod comment_store;

pub use comment_store::{PostgresCommentStore, PostgresTransaction};
