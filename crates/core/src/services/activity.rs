//! Activity checklist service.

use agora_common::{AppError, AppResult};
use agora_db::{
    entities::{content_item::ContentType, need_activity},
    repositories::{ActivityRepository, ContentRepository},
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};
use crate::services::lifecycle::LifecycleService;

/// Completed versus total activities of a need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistProgress {
    /// Completed activities.
    pub completed: u32,
    /// All activities.
    pub total: u32,
    /// `completed / total`, or 0 for an empty checklist.
    pub ratio: f64,
}

impl ChecklistProgress {
    /// Progress from raw counts.
    #[must_use]
    pub fn new(completed: u32, total: u32) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            f64::from(completed) / f64::from(total)
        };
        Self {
            completed,
            total,
            ratio,
        }
    }

    /// Progress of a list of activities.
    #[must_use]
    pub fn from_activities(activities: &[need_activity::Model]) -> Self {
        let completed = activities.iter().filter(|a| a.is_completed).count();
        Self::new(completed as u32, activities.len() as u32)
    }

    /// Whether every activity is done. An empty checklist never is.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Result of completing or reopening an activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    /// The activity after the call.
    pub activity: need_activity::Model,
    /// Checklist progress after the call.
    pub progress: ChecklistProgress,
    /// Whether this call changed anything.
    pub changed: bool,
}

/// A need's checklist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    /// Content item ID.
    pub content_id: String,
    /// Activities in checklist order.
    pub activities: Vec<need_activity::Model>,
    /// Checklist progress.
    pub progress: ChecklistProgress,
}

/// Activity service for need checklists.
#[derive(Clone)]
pub struct ActivityService {
    activity_repo: ActivityRepository,
    content_repo: ContentRepository,
    lifecycle: LifecycleService,
    event_publisher: Option<EventPublisherService>,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(
        activity_repo: ActivityRepository,
        content_repo: ContentRepository,
        lifecycle: LifecycleService,
    ) -> Self {
        Self {
            activity_repo,
            content_repo,
            lifecycle,
            event_publisher: None,
        }
    }

    /// Set the event publisher, here and on the lifecycle service.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.lifecycle.set_event_publisher(Arc::clone(&event_publisher));
        self.event_publisher = Some(event_publisher);
    }

    /// Mark an activity completed by `user_id`.
    ///
    /// Completing an already completed activity keeps the original completer.
    pub async fn complete_activity(
        &self,
        activity_id: &str,
        user_id: &str,
    ) -> AppResult<ActivityUpdate> {
        let activity = self.activity_repo.get_by_id(activity_id).await?;

        let changed = if activity.is_completed {
            false
        } else {
            self.activity_repo
                .mark_completed(activity_id, user_id, Utc::now())
                .await?
        };

        self.finish(activity.content_id, activity_id, changed, ChangeKind::ActivityCompleted)
            .await
    }

    /// Reopen a completed activity. Reopening an open activity is a no-op.
    pub async fn uncomplete_activity(&self, activity_id: &str) -> AppResult<ActivityUpdate> {
        let activity = self.activity_repo.get_by_id(activity_id).await?;

        let changed = if activity.is_completed {
            self.activity_repo.mark_incomplete(activity_id).await?
        } else {
            false
        };

        self.finish(activity.content_id, activity_id, changed, ChangeKind::ActivityUncompleted)
            .await
    }

    /// List a need's activities with progress.
    pub async fn checklist(&self, content_id: &str) -> AppResult<Checklist> {
        let content = self.content_repo.get_by_id(content_id).await?;
        if content.content_type != ContentType::Need {
            return Err(AppError::ContentTypeMismatch {
                expected: ContentType::Need.to_string(),
                actual: content.content_type.to_string(),
            });
        }

        let activities = self.activity_repo.list_by_content(content_id).await?;
        let progress = ChecklistProgress::from_activities(&activities);

        Ok(Checklist {
            content_id: content_id.to_string(),
            activities,
            progress,
        })
    }

    async fn finish(
        &self,
        content_id: String,
        activity_id: &str,
        changed: bool,
        kind: ChangeKind,
    ) -> AppResult<ActivityUpdate> {
        let activity = self.activity_repo.get_by_id(activity_id).await?;
        let activities = self.activity_repo.list_by_content(&content_id).await?;
        let progress = ChecklistProgress::from_activities(&activities);

        if changed {
            tracing::info!(
                activity_id = %activity_id,
                content_id = %content_id,
                completed = progress.completed,
                total = progress.total,
                "Activity updated"
            );
            publish(
                self.event_publisher.as_ref(),
                ContentChanged::now(content_id.clone(), kind),
            )
            .await;
            self.lifecycle.advance_quietly(&content_id).await;
        } else {
            tracing::debug!(activity_id = %activity_id, "Activity unchanged");
        }

        Ok(ActivityUpdate {
            activity,
            progress,
            changed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::recording::RecordingPublisher;
    use crate::services::lifecycle::LifecyclePolicies;
    use crate::services::test_support::{activity, content, exec_ok};
    use agora_db::entities::content_item::ContentStatus;
    use agora_db::repositories::PollRepository;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service(db: MockDatabase) -> ActivityService {
        let db = Arc::new(db.into_connection());
        let lifecycle = LifecycleService::new(
            ContentRepository::new(Arc::clone(&db)),
            PollRepository::new(Arc::clone(&db)),
            ActivityRepository::new(Arc::clone(&db)),
            LifecyclePolicies::default(),
        );
        ActivityService::new(
            ActivityRepository::new(Arc::clone(&db)),
            ContentRepository::new(db),
            lifecycle,
        )
    }

    #[test]
    fn test_progress_ratio() {
        let progress = ChecklistProgress::new(2, 3);
        assert!((progress.ratio - 0.667).abs() < 0.001);
        assert!(!progress.is_complete());

        assert_eq!(ChecklistProgress::new(0, 0).ratio, 0.0);
        assert!(!ChecklistProgress::new(0, 0).is_complete());
        assert!(ChecklistProgress::new(3, 3).is_complete());
    }

    #[tokio::test]
    async fn test_complete_second_of_three_activities() {
        let before = activity("a2", "n1", 1, false);
        let after = activity("a2", "n1", 1, true);
        let mut need = content("n1", ContentType::Need, ContentStatus::Active);
        need.funding_goal = Some(1000);
        let checklist = [
            activity("a1", "n1", 0, true),
            after.clone(),
            activity("a3", "n1", 2, false),
        ];

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[after]])
            .append_query_results([checklist.clone()])
            .append_query_results([[need]])
            .append_query_results([checklist]);

        let recorder = Arc::new(RecordingPublisher::default());
        let mut service = service(db);
        service.set_event_publisher(recorder.clone());

        let update = service.complete_activity("a2", "helper1").await.unwrap();

        assert!(update.changed);
        assert!(update.activity.is_completed);
        assert_eq!(update.progress.completed, 2);
        assert!((update.progress.ratio - 0.667).abs() < 0.001);
        assert_eq!(recorder.kinds(), vec![ChangeKind::ActivityCompleted]);
    }

    #[tokio::test]
    async fn test_completing_last_activity_completes_need() {
        let before = activity("a3", "n1", 2, false);
        let after = activity("a3", "n1", 2, true);
        let need = content("n1", ContentType::Need, ContentStatus::Active);
        let checklist = [
            activity("a1", "n1", 0, true),
            activity("a2", "n1", 1, true),
            after.clone(),
        ];

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[before]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[after]])
            .append_query_results([checklist.clone()])
            .append_query_results([[need]])
            .append_query_results([checklist])
            .append_exec_results([exec_ok(1)]);

        let recorder = Arc::new(RecordingPublisher::default());
        let mut service = service(db);
        service.set_event_publisher(recorder.clone());

        let update = service.complete_activity("a3", "helper1").await.unwrap();

        assert!(update.progress.is_complete());
        assert_eq!(
            recorder.kinds(),
            vec![ChangeKind::ActivityCompleted, ChangeKind::StatusChanged]
        );
    }

    #[tokio::test]
    async fn test_complete_already_completed_keeps_original() {
        let done = activity("a1", "n1", 0, true);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[done.clone()]])
            .append_query_results([[done.clone()]])
            .append_query_results([[done]]);

        let recorder = Arc::new(RecordingPublisher::default());
        let mut service = service(db);
        service.set_event_publisher(recorder.clone());

        let update = service.complete_activity("a1", "someone-else").await.unwrap();

        assert!(!update.changed);
        assert_eq!(update.activity.completed_by.as_deref(), Some("helper1"));
        assert!(recorder.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_uncomplete_open_activity_is_noop() {
        let open = activity("a1", "n1", 0, false);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open.clone()]])
            .append_query_results([[open.clone()]])
            .append_query_results([[open]]);

        let update = service(db).uncomplete_activity("a1").await.unwrap();

        assert!(!update.changed);
        assert_eq!(update.progress.completed, 0);
    }

    #[tokio::test]
    async fn test_checklist_rejects_other_types() {
        let poll = content("p1", ContentType::Poll, ContentStatus::Voting);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[poll]]);

        let result = service(db).checklist("p1").await;

        assert!(matches!(result, Err(AppError::ContentTypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_unknown_activity_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<need_activity::Model>::new()]);

        let result = service(db).complete_activity("missing", "helper1").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
