//! Event registration service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{
    entities::{
        content_item::{self, ContentStatus, ContentType},
        event_registration::{self, RegistrationStatus},
    },
    repositories::{ContentRepository, RegistrationRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;
use std::sync::Arc;

use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};
use crate::services::lifecycle::LifecycleService;

/// What a registration request has to do to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationAction {
    /// The user is already registered.
    AlreadyRegistered,
    /// Flip a cancelled row back to registered.
    Reactivate,
    /// First registration by this user.
    Insert,
}

/// Decide how a registration applies.
///
/// An existing active registration always succeeds; anything else needs a
/// free seat.
pub fn decide_registration(
    current: Option<RegistrationStatus>,
    active_count: u64,
    max_participants: Option<i32>,
) -> AppResult<RegistrationAction> {
    if current == Some(RegistrationStatus::Registered) {
        return Ok(RegistrationAction::AlreadyRegistered);
    }

    if let Some(max) = max_participants
        && active_count >= u64::try_from(max).unwrap_or(0)
    {
        return Err(AppError::EventFull {
            max_participants: max,
        });
    }

    Ok(match current {
        Some(_) => RegistrationAction::Reactivate,
        None => RegistrationAction::Insert,
    })
}

fn ensure_event(content: &content_item::Model) -> AppResult<()> {
    if content.content_type == ContentType::Event {
        Ok(())
    } else {
        Err(AppError::ContentTypeMismatch {
            expected: ContentType::Event.to_string(),
            actual: content.content_type.to_string(),
        })
    }
}

/// A user's registration state for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationState {
    /// Event content ID.
    pub content_id: String,
    /// The user's registration status, `None` if never registered.
    pub status: Option<RegistrationStatus>,
    /// Active registrations for the event.
    pub active_count: u64,
    /// Capacity, if capped.
    pub max_participants: Option<i32>,
    /// Whether this call changed anything.
    pub changed: bool,
}

/// Registration service for capacity-bounded event RSVPs.
#[derive(Clone)]
pub struct RegistrationService {
    content_repo: ContentRepository,
    registration_repo: RegistrationRepository,
    lifecycle: LifecycleService,
    id_gen: IdGenerator,
    event_publisher: Option<EventPublisherService>,
}

impl RegistrationService {
    /// Create a new registration service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        registration_repo: RegistrationRepository,
        lifecycle: LifecycleService,
    ) -> Self {
        Self {
            content_repo,
            registration_repo,
            lifecycle,
            id_gen: IdGenerator::new(),
            event_publisher: None,
        }
    }

    /// Set the event publisher, here and on the lifecycle service.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.lifecycle.set_event_publisher(Arc::clone(&event_publisher));
        self.event_publisher = Some(event_publisher);
    }

    /// Register `user_id` for an event.
    pub async fn register(&self, content_id: &str, user_id: &str) -> AppResult<RegistrationState> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;
        ensure_event(&content)?;

        let existing = self.registration_repo.find(&txn, content_id, user_id).await?;
        let already_registered = existing
            .as_ref()
            .is_some_and(|r| r.status == RegistrationStatus::Registered);
        if content.status == ContentStatus::Completed && !already_registered {
            return Err(AppError::ContentClosed(content_id.to_string()));
        }

        let active_count = self.registration_repo.count_active(&txn, content_id).await?;
        let action = decide_registration(
            existing.as_ref().map(|r| r.status),
            active_count,
            content.max_participants,
        )?;

        match action {
            RegistrationAction::AlreadyRegistered => {
                tracing::debug!(content_id = %content_id, user_id = %user_id, "Already registered");
                return Ok(RegistrationState {
                    content_id: content_id.to_string(),
                    status: Some(RegistrationStatus::Registered),
                    active_count,
                    max_participants: content.max_participants,
                    changed: false,
                });
            }
            RegistrationAction::Reactivate => {
                self.registration_repo
                    .update_status(
                        &txn,
                        content_id,
                        user_id,
                        RegistrationStatus::Cancelled,
                        RegistrationStatus::Registered,
                    )
                    .await?;
            }
            RegistrationAction::Insert => {
                let now = Utc::now();
                let model = event_registration::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    content_id: Set(content_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    status: Set(RegistrationStatus::Registered),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                };
                self.registration_repo.insert(&txn, model).await?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        tracing::info!(content_id = %content_id, user_id = %user_id, "Registered for event");
        publish(
            self.event_publisher.as_ref(),
            ContentChanged::now(content_id, ChangeKind::Registered),
        )
        .await;
        self.lifecycle.advance_quietly(content_id).await;

        Ok(RegistrationState {
            content_id: content_id.to_string(),
            status: Some(RegistrationStatus::Registered),
            active_count: active_count + 1,
            max_participants: content.max_participants,
            changed: true,
        })
    }

    /// Cancel `user_id`'s registration. Cancelling nothing is a no-op.
    pub async fn cancel(&self, content_id: &str, user_id: &str) -> AppResult<RegistrationState> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;
        ensure_event(&content)?;

        let existing = self.registration_repo.find(&txn, content_id, user_id).await?;
        let changed = match existing.as_ref().map(|r| r.status) {
            Some(RegistrationStatus::Registered) => {
                self.registration_repo
                    .update_status(
                        &txn,
                        content_id,
                        user_id,
                        RegistrationStatus::Registered,
                        RegistrationStatus::Cancelled,
                    )
                    .await?
            }
            _ => false,
        };
        let active_count = self.registration_repo.count_active(&txn, content_id).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        let status = if changed {
            tracing::info!(content_id = %content_id, user_id = %user_id, "Registration cancelled");
            publish(
                self.event_publisher.as_ref(),
                ContentChanged::now(content_id, ChangeKind::RegistrationCancelled),
            )
            .await;
            self.lifecycle.advance_quietly(content_id).await;
            Some(RegistrationStatus::Cancelled)
        } else {
            tracing::debug!(content_id = %content_id, user_id = %user_id, "Nothing to cancel");
            existing.map(|r| r.status)
        };

        Ok(RegistrationState {
            content_id: content_id.to_string(),
            status,
            active_count,
            max_participants: content.max_participants,
            changed,
        })
    }

    /// The caller's registration status and the event's active count.
    pub async fn registration_status(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<RegistrationState> {
        let content = self.content_repo.get_by_id(content_id).await?;
        ensure_event(&content)?;

        let existing = self.registration_repo.find_by_user(content_id, user_id).await?;
        let active_count = self
            .registration_repo
            .count_active_by_content(content_id)
            .await?;

        Ok(RegistrationState {
            content_id: content_id.to_string(),
            status: existing.map(|r| r.status),
            active_count,
            max_participants: content.max_participants,
            changed: false,
        })
    }
}
