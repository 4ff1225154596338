//! Background processing for agora.
//!
//! This crate provides the pieces that run beside the HTTP surface:
//!
//! - **Pub/Sub**: Content change notifications over Redis
//! - **Scheduler**: Periodic lifecycle sweeps

pub mod pubsub;
pub mod scheduler;

pub use pubsub::{PubSubEvent, RedisPubSub, channels as pubsub_channels};
pub use scheduler::{JobExecutor, SchedulerConfig, run_scheduler};
