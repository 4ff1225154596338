//! Redis Pub/Sub for content change notifications.
//!
//! Every change is published on the all-content channel and on the
//! per-item channel, and mirrored to a local broadcast so in-process
//! consumers see events from every server instance.

#![allow(missing_docs)]

use agora_common::{AppError, AppResult};
use agora_core::services::{ChangeKind, ContentChanged, EventPublisher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::clients::{Client, SubscriberClient};
use fred::error::{Error as RedisError, ErrorKind as RedisErrorKind};
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pub/Sub channel names.
pub mod channels {
    /// Channel carrying changes of every content item.
    #[must_use]
    pub fn content(prefix: &str) -> String {
        format!("{prefix}:content")
    }

    /// Channel carrying changes of one content item.
    #[must_use]
    pub fn content_item(prefix: &str, content_id: &str) -> String {
        format!("{prefix}:content:{content_id}")
    }
}

/// Pub/Sub event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PubSubEvent {
    /// A content item changed.
    ContentChanged {
        content_id: String,
        change_kind: ChangeKind,
        occurred_at: DateTime<Utc>,
    },
}

impl From<&ContentChanged> for PubSubEvent {
    fn from(event: &ContentChanged) -> Self {
        Self::ContentChanged {
            content_id: event.content_id.clone(),
            change_kind: event.change_kind,
            occurred_at: event.occurred_at,
        }
    }
}

impl PubSubEvent {
    /// The content item this event is about.
    #[must_use]
    pub fn content_id(&self) -> &str {
        match self {
            Self::ContentChanged { content_id, .. } => content_id,
        }
    }
}

/// Redis Pub/Sub manager for event distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    prefix: String,
    /// Local broadcast channel for events received from Redis.
    local_tx: broadcast::Sender<PubSubEvent>,
}

impl RedisPubSub {
    /// Create a new Redis Pub/Sub manager.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        let (local_tx, _) = broadcast::channel(1000);

        info!(prefix, "Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
            local_tx,
        })
    }

    /// Subscribe to the all-content channel and start the event loop.
    pub async fn start(&self) -> Result<(), RedisError> {
        self.subscriber
            .subscribe(channels::content(&self.prefix))
            .await?;

        info!("Subscribed to Redis Pub/Sub channels");

        let local_tx = self.local_tx.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                if let Some(payload) = message.value.as_string() {
                    match serde_json::from_str::<PubSubEvent>(&payload) {
                        Ok(event) => {
                            debug!(?event, "Received Pub/Sub event");
                            if local_tx.send(event).is_err() {
                                debug!("No local subscribers for Pub/Sub event");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to parse Pub/Sub message");
                        }
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Publish an event to a channel.
    pub async fn publish(&self, channel: &str, event: &PubSubEvent) -> Result<(), RedisError> {
        let payload = serde_json::to_string(event).map_err(|e| {
            RedisError::new(
                RedisErrorKind::InvalidArgument,
                format!("Serialization error: {e}"),
            )
        })?;
        let _: () = self.publisher.publish(channel, payload).await?;
        debug!(channel, ?event, "Published Pub/Sub event");
        Ok(())
    }

    /// Publish a content change on the all-content and per-item channels.
    pub async fn publish_content_changed(&self, event: &ContentChanged) -> Result<(), RedisError> {
        let event = PubSubEvent::from(event);

        self.publish(&channels::content(&self.prefix), &event)
            .await?;
        self.publish(
            &channels::content_item(&self.prefix, event.content_id()),
            &event,
        )
        .await
    }

    /// Get a receiver for local broadcast events.
    #[must_use]
    pub fn subscribe_local(&self) -> broadcast::Receiver<PubSubEvent> {
        self.local_tx.subscribe()
    }

    /// Get the number of local subscribers.
    #[must_use]
    pub fn local_subscriber_count(&self) -> usize {
        self.local_tx.receiver_count()
    }

    /// Shutdown the Pub/Sub manager.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

/// Lets core services publish through Redis without depending on this crate.
#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish_content_changed(&self, event: &ContentChanged) -> AppResult<()> {
        Self::publish_content_changed(self, event)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(channels::content("agora"), "agora:content");
        assert_eq!(
            channels::content_item("agora", "01hx"),
            "agora:content:01hx"
        );
    }

    #[test]
    fn test_content_changed_wire_format() {
        let changed = ContentChanged::now("c1".to_string(), ChangeKind::VoteCast);
        let event = PubSubEvent::from(&changed);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "contentChanged");
        assert_eq!(json["contentId"], "c1");
        assert_eq!(json["changeKind"], "voteCast");
        assert!(json["occurredAt"].is_string());

        let parsed: PubSubEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result = serde_json::from_str::<PubSubEvent>(r#"{"type":"contentDeleted","id":"n1"}"#);
        assert!(result.is_err());
    }
}
