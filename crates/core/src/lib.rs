//! Core business logic for agora.
//!
//! Services validate requests against the current state of a content item,
//! mutate the store inside one transaction per operation, publish a
//! [`ContentChanged`] event, and let the lifecycle state machine decide
//! whether the item moves on.

pub mod services;

pub use services::*;
