//! Redis adapters.
//!
//! - `RedisStreamClient` - `StreamClient` over Redis Streams (`XADD`)

mod stream_client;

pub use stream_client::RedisStreamClient;
