//! Application layer - Use cases and the commit-boundary machinery.
//!
//! Services in this layer open transactions, mutate aggregates, and buffer
//! domain events. The transaction scope releases those events only after
//! the store commits, and the emitter hands them to a worker pool so the
//! request path never waits on the stream.

pub mod comments;
pub mod dispatch;
pub mod emitter;
pub mod likes;
pub mod transaction;
pub mod worker_pool;

pub use comments::{
    CommentService, CreateCommentCommand, DeleteCommentCommand, UpdateCommentCommand,
};
pub use dispatch::{Delivery, DeliveryOutcome, EventDispatcher, RetryPolicy};
pub use emitter::EventEmitter;
pub use likes::{CommentLikeService, LikeCommand};
pub use transaction::{TransactionHook, TransactionManager, TransactionScope};
pub use worker_pool::{
    OverflowPolicy, PoolError, PoolStats, Submission, WorkerPool, WorkerPoolConfig,
};
