//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `events` - Stream publishing and the outbox relay
//! - `http` - Post service client
//! - `memory` - In-memory comment store
//! - `postgres` - PostgreSQL comment store
//! - `redis` - Redis Streams client

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use events::{BrokerPublisher, InMemoryStreamClient, OutboxRelay, OutboxRelayConfig};
pub use http::HttpPostDirectory;
pub use memory::InMemoryCommentStore;
pub use postgres::PostgresCommentStore;
pub use redis::RedisStreamClient;
