//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, events, errors)
//! - `comment` - Comment aggregate, likes and comment events

pub mod comment;
pub mod foundation;
