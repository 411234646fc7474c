//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `CommentStore` / `CommentTransaction` - Comments, likes and outbox rows
//! - `OutboxStore` - Delivery bookkeeping for committed events
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Typed publishing of committed domain events
//! - `StreamClient` - Raw keyed sends to the external stream
//!
//! ## External Service Ports
//!
//! - `PostDirectory` - Post existence checks against the post service

mod comment_store;
mod event_publisher;
mod outbox_store;
mod post_directory;
mod stream_client;

pub use comment_store::{CommentStore, CommentTransaction, IsolationLevel};
pub use event_publisher::{DispatchFailure, EventPublisher};
pub use outbox_store::{OutboxEntry, OutboxStatus, OutboxStore};
pub use post_directory::PostDirectory;
pub use stream_client::{StreamAck, StreamClient};
