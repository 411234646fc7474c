//! Comment Service - comment and like write paths with commit-gated event
//! dispatch.
//!
//! Domain events raised inside a transaction are held until the store
//! commits, then handed to a bounded worker pool that publishes them to
//! Redis Streams. A transactional outbox backs the fast path so committed
//! events survive crashes and broker outages.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod runtime;
