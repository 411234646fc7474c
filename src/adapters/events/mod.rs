//! Event delivery adapters.
//!
//! - `BrokerPublisher` - `EventPublisher` that routes events onto keyed streams
//! - `InMemoryStreamClient` - Recording stream for tests, with failure injection
//! - `OutboxRelay` - Background sweeper for events the fast path did not deliver

mod broker_publisher;
mod in_memory;
mod outbox_relay;

pub use broker_publisher::BrokerPublisher;
pub use in_memory::{InMemoryStreamClient, StreamMessage};
pub use outbox_relay::{OutboxRelay, OutboxRelayConfig, RelayReport};
