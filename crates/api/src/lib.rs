//! HTTP API layer for agora.
//!
//! This crate provides the JSON API over the content engine:
//!
//! - **Endpoints**: Content, polls, events, activities and funding
//! - **Extractors**: Gateway-forwarded identity
//! - **Middleware**: Identity header handling
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
