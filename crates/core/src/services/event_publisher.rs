//! Event publisher service.
//!
//! Provides an abstraction for publishing content change events.
//! The actual implementation is provided by the queue crate (Redis Pub/Sub).

use agora_common::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened to a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    /// The item was created and opened for voting.
    Created,
    /// A vote was cast or moved.
    VoteCast,
    /// A user registered for an event.
    Registered,
    /// A user cancelled an event registration.
    RegistrationCancelled,
    /// A funding transaction was applied.
    FundingRecorded,
    /// The cached funding total was repaired.
    FundingReconciled,
    /// A checklist activity was completed.
    ActivityCompleted,
    /// A checklist activity was reopened.
    ActivityUncompleted,
    /// The item moved to a new status.
    StatusChanged,
    /// The external completion signal arrived.
    CompletionSignaled,
}

/// A content item changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChanged {
    /// Content item ID.
    pub content_id: String,
    /// Kind of change.
    pub change_kind: ChangeKind,
    /// When the change was committed.
    pub occurred_at: DateTime<Utc>,
}

impl ContentChanged {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn now(content_id: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            content_id: content_id.into(),
            change_kind,
            occurred_at: Utc::now(),
        }
    }
}

/// Trait for publishing content change events.
///
/// This allows the core services to publish events
/// without directly depending on the queue/pubsub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a content changed event.
    async fn publish_content_changed(&self, event: &ContentChanged) -> AppResult<()>;
}

/// A no-op implementation of `EventPublisher` for testing or when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_content_changed(&self, _event: &ContentChanged) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// Publish an event if a publisher is configured.
///
/// Failures are logged and swallowed; the mutation has already committed.
pub(crate) async fn publish(publisher: Option<&EventPublisherService>, event: ContentChanged) {
    let Some(publisher) = publisher else {
        return;
    };

    if let Err(e) = publisher.publish_content_changed(&event).await {
        tracing::warn!(
            error = %e,
            content_id = %event.content_id,
            change_kind = ?event.change_kind,
            "Failed to publish content changed event"
        );
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::{ChangeKind, ContentChanged, EventPublisher};
    use agora_common::{AppError, AppResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Publisher that keeps every event in memory.
    #[derive(Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<ContentChanged>>,
        fail: bool,
    }

    impl RecordingPublisher {
        pub fn failing() -> Self {
            Self {
                events: Mutex::default(),
                fail: true,
            }
        }

        pub fn kinds(&self) -> Vec<ChangeKind> {
            self.events
                .lock()
                .map(|events| events.iter().map(|e| e.change_kind).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_content_changed(&self, event: &ContentChanged) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Redis("connection reset".to_string()));
            }
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
            Ok(())
        }
    }
}
