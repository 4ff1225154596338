//! Funding aggregation service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{
    entities::{
        content_item::{self, ContentType},
        funding_transaction::{self, FundingSource},
    },
    repositories::{ContentRepository, FundingRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};
use crate::services::lifecycle::LifecycleService;

/// Maximum dedupe key length.
const MAX_DEDUPE_KEY_LEN: usize = 128;

/// Share of the goal reached, capped at 1. `None` without a goal.
#[must_use]
pub fn funding_progress(current: i64, goal: Option<i64>) -> Option<f64> {
    goal.filter(|g| *g > 0)
        .map(|g| (current as f64 / g as f64).min(1.0))
}

/// Whether a content item takes funding.
#[must_use]
pub fn accepts_funding(content: &content_item::Model) -> bool {
    content.content_type == ContentType::Need || content.funding_goal.is_some()
}

/// A payment that already succeeded upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFundingInput {
    /// Content item ID.
    pub content_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Donation or sponsorship.
    pub source_type: FundingSource,
    /// Idempotency key supplied by the payment collaborator.
    pub dedupe_key: String,
}

/// Funding totals of a content item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingResult {
    /// Content item ID.
    pub content_id: String,
    /// Running total in minor currency units.
    pub current_funding: i64,
    /// Goal, if any.
    pub funding_goal: Option<i64>,
    /// `min(current / goal, 1)`, if there is a goal.
    pub progress: Option<f64>,
    /// Whether this call added a transaction.
    pub applied: bool,
}

/// Funding totals plus ledger size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSummary {
    /// Content item ID.
    pub content_id: String,
    /// Running total in minor currency units.
    pub current_funding: i64,
    /// Goal, if any.
    pub funding_goal: Option<i64>,
    /// `min(current / goal, 1)`, if there is a goal.
    pub progress: Option<f64>,
    /// Number of transactions recorded.
    pub transaction_count: u64,
}

/// Result of comparing the cached total against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Cached total before the call.
    pub cached: i64,
    /// Sum of the ledger.
    pub actual: i64,
    /// Whether the cached total was rewritten.
    pub repaired: bool,
}

/// Funding service for recording payments against content.
#[derive(Clone)]
pub struct FundingService {
    content_repo: ContentRepository,
    funding_repo: FundingRepository,
    lifecycle: LifecycleService,
    id_gen: IdGenerator,
    event_publisher: Option<EventPublisherService>,
}

impl FundingService {
    /// Create a new funding service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        funding_repo: FundingRepository,
        lifecycle: LifecycleService,
    ) -> Self {
        Self {
            content_repo,
            funding_repo,
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

    /// Record a successful payment.
    ///
    /// Replaying a dedupe key returns the current totals without applying
    /// the amount again; replaying it with different data is a conflict.
    pub async fn record_funding(&self, input: RecordFundingInput) -> AppResult<FundingResult> {
        if input.amount <= 0 {
            return Err(AppError::InvalidAmount(input.amount.to_string()));
        }
        let dedupe_key = input.dedupe_key.trim();
        if dedupe_key.is_empty() || dedupe_key.len() > MAX_DEDUPE_KEY_LEN {
            return Err(AppError::Validation(format!(
                "dedupeKey must be 1-{MAX_DEDUPE_KEY_LEN} characters"
            )));
        }

        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, &input.content_id).await?;
        if !accepts_funding(&content) {
            return Err(AppError::ContentTypeMismatch {
                expected: "need or content with a funding goal".to_string(),
                actual: content.content_type.to_string(),
            });
        }

        if let Some(existing) = self.funding_repo.find_by_dedupe_key(&txn, dedupe_key).await? {
            if existing.content_id != input.content_id
                || existing.amount != input.amount
                || existing.source_type != input.source_type
            {
                return Err(AppError::Conflict(format!(
                    "Dedupe key {dedupe_key} was already used for a different payment"
                )));
            }

            tracing::debug!(content_id = %input.content_id, dedupe_key = %dedupe_key, "Funding replay ignored");
            return Ok(FundingResult {
                content_id: input.content_id,
                current_funding: content.current_funding,
                funding_goal: content.funding_goal,
                progress: funding_progress(content.current_funding, content.funding_goal),
                applied: false,
            });
        }

        let model = funding_transaction::ActiveModel {
            id: Set(self.id_gen.generate()),
            content_id: Set(input.content_id.clone()),
            amount: Set(input.amount),
            source_type: Set(input.source_type),
            dedupe_key: Set(dedupe_key.to_string()),
            created_at: Set(Utc::now().into()),
        };
        self.funding_repo.insert(&txn, model).await?;
        self.content_repo
            .add_funding(&txn, &input.content_id, input.amount)
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        let current_funding = content.current_funding + input.amount;
        tracing::info!(
            content_id = %input.content_id,
            amount = input.amount,
            source = ?input.source_type,
            total = current_funding,
            "Funding recorded"
        );
        publish(
            self.event_publisher.as_ref(),
            ContentChanged::now(input.content_id.clone(), ChangeKind::FundingRecorded),
        )
        .await;
        self.lifecycle.advance_quietly(&input.content_id).await;

        Ok(FundingResult {
            content_id: input.content_id,
            current_funding,
            funding_goal: content.funding_goal,
            progress: funding_progress(current_funding, content.funding_goal),
            applied: true,
        })
    }

    /// Totals and ledger size of a content item.
    pub async fn funding_summary(&self, content_id: &str) -> AppResult<FundingSummary> {
        let content = self.content_repo.get_by_id(content_id).await?;
        let transaction_count = self.funding_repo.count_for_content(content_id).await?;

        Ok(FundingSummary {
            content_id: content_id.to_string(),
            current_funding: content.current_funding,
            funding_goal: content.funding_goal,
            progress: funding_progress(content.current_funding, content.funding_goal),
            transaction_count,
        })
    }

    /// Recompute the total from the ledger and repair the cache if it drifted.
    pub async fn reconcile(&self, content_id: &str) -> AppResult<ReconcileReport> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;
        let actual = self.funding_repo.sum_for_content(&txn, content_id).await?;

        let repaired = actual != content.current_funding;
        if repaired {
            self.content_repo
                .set_current_funding(&txn, content_id, actual)
                .await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        if repaired {
            tracing::warn!(
                content_id = %content_id,
                cached = content.current_funding,
                actual = actual,
                "Funding total drifted from ledger; repaired"
            );
            publish(
                self.event_publisher.as_ref(),
                ContentChanged::now(content_id, ChangeKind::FundingReconciled),
            )
            .await;
        }

        Ok(ReconcileReport {
            cached: content.current_funding,
            actual,
            repaired,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::recording::RecordingPublisher;
    use crate::services::lifecycle::LifecyclePolicies;
    use crate::services::test_support::{content, count_row, exec_ok};
    use agora_db::entities::content_item::ContentStatus;
    use agora_db::repositories::{ActivityRepository, PollRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service(db: MockDatabase) -> FundingService {
        let db = Arc::new(db.into_connection());
        let lifecycle = LifecycleService::new(
            ContentRepository::new(Arc::clone(&db)),
            PollRepository::new(Arc::clone(&db)),
            ActivityRepository::new(Arc::clone(&db)),
            LifecyclePolicies::default(),
        );
        FundingService::new(
            ContentRepository::new(Arc::clone(&db)),
            FundingRepository::new(db),
            lifecycle,
        )
    }

    fn need(current: i64) -> content_item::Model {
        let mut need = content("n1", ContentType::Need, ContentStatus::Approved);
        need.funding_goal = Some(1000);
        need.current_funding = current;
        need
    }

    fn transaction(amount: i64, key: &str) -> funding_transaction::Model {
        funding_transaction::Model {
            id: "f1".to_string(),
            content_id: "n1".to_string(),
            amount,
            source_type: FundingSource::Donation,
            dedupe_key: key.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn input(amount: i64, key: &str) -> RecordFundingInput {
        RecordFundingInput {
            content_id: "n1".to_string(),
            amount,
            source_type: FundingSource::Donation,
            dedupe_key: key.to_string(),
        }
    }

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(funding_progress(400, Some(1000)), Some(0.4));
        assert_eq!(funding_progress(1500, Some(1000)), Some(1.0));
        assert_eq!(funding_progress(400, None), None);
    }

    #[test]
    fn test_accepts_funding() {
        assert!(accepts_funding(&content("n1", ContentType::Need, ContentStatus::Voting)));
        assert!(!accepts_funding(&content("p1", ContentType::Poll, ContentStatus::Voting)));

        let mut event = content("e1", ContentType::Event, ContentStatus::Voting);
        event.funding_goal = Some(5000);
        assert!(accepts_funding(&event));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let result = service(db).record_funding(input(0, "tx0")).await;

        assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_record_then_replay() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[need(0)]])
            .append_query_results([Vec::<funding_transaction::Model>::new()])
            .append_query_results([[transaction(400, "tx1")]])
            .append_exec_results([exec_ok(1)])
            // best-effort advance: approved items never move on their own
            .append_query_results([[need(400)]])
            // replay
            .append_query_results([[need(400)]])
            .append_query_results([[transaction(400, "tx1")]]);

        let recorder = Arc::new(RecordingPublisher::default());
        let mut service = service(db);
        service.set_event_publisher(recorder.clone());

        let first = service.record_funding(input(400, "tx1")).await.unwrap();
        assert!(first.applied);
        assert_eq!(first.current_funding, 400);
        assert_eq!(first.progress, Some(0.4));

        let replay = service.record_funding(input(400, "tx1")).await.unwrap();
        assert!(!replay.applied);
        assert_eq!(replay.current_funding, 400);

        assert_eq!(recorder.kinds(), vec![ChangeKind::FundingRecorded]);
    }

    #[tokio::test]
    async fn test_replay_with_different_amount_conflicts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[need(400)]])
            .append_query_results([[transaction(400, "tx1")]]);

        let result = service(db).record_funding(input(500, "tx1")).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_poll_without_goal_is_rejected() {
        let poll = content("n1", ContentType::Poll, ContentStatus::Voting);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[poll]]);

        let result = service(db).record_funding(input(100, "tx9")).await;

        assert!(matches!(result, Err(AppError::ContentTypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_funding_summary() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[need(1200)]])
            .append_query_results([[count_row(3)]]);

        let summary = service(db).funding_summary("n1").await.unwrap();

        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.progress, Some(1.0));
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[need(300)]])
            .append_query_results([[maplit::btreemap! {
                "total" => sea_orm::Value::BigInt(Some(400)),
            }]])
            .append_exec_results([exec_ok(1)]);

        let report = service(db).reconcile("n1").await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                cached: 300,
                actual: 400,
                repaired: true,
            }
        );
    }

    #[tokio::test]
    async fn test_reconcile_without_drift() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[need(400)]])
            .append_query_results([[maplit::btreemap! {
                "total" => sea_orm::Value::BigInt(Some(400)),
            }]]);

        let report = service(db).reconcile("n1").await.unwrap();

        assert!(!report.repaired);
    }
}
