//! Content lifecycle.
//!
//! Status only ever moves forward along
//! `draft -> voting -> approved -> active -> completed`. Automatic
//! transitions are decided by pluggable approval and completion policies;
//! `approved -> active` is always an explicit request by the creator.

use std::collections::HashMap;
use std::sync::Arc;

use agora_common::{AppError, AppResult, LifecycleConfig, NeedCompletionRule};
use agora_db::{
    entities::content_item::{self, ContentStatus, ContentType},
    repositories::{ActivityRepository, ContentRepository, PollRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, prelude::DateTimeWithTimeZone};
use serde::Serialize;

use crate::services::activity::ChecklistProgress;
use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};

/// The status that follows `status`, if any.
#[must_use]
pub const fn next_status(status: ContentStatus) -> Option<ContentStatus> {
    match status {
        ContentStatus::Draft => Some(ContentStatus::Voting),
        ContentStatus::Voting => Some(ContentStatus::Approved),
        ContentStatus::Approved => Some(ContentStatus::Active),
        ContentStatus::Active => Some(ContentStatus::Completed),
        ContentStatus::Completed => None,
    }
}

/// Fail unless `to` directly follows `from`.
pub fn check_transition(from: ContentStatus, to: ContentStatus) -> AppResult<()> {
    if next_status(from) == Some(to) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Whether a deadline counts as reached. An absent deadline always does.
#[must_use]
pub fn deadline_reached(deadline: Option<&DateTimeWithTimeZone>, now: DateTime<Utc>) -> bool {
    deadline.is_none_or(|d| *d <= now)
}

/// Whether an item currently accepts votes.
#[must_use]
pub fn vote_window_open(content: &content_item::Model, now: DateTime<Utc>) -> bool {
    content.status == ContentStatus::Voting
        && content.voting_deadline.as_ref().is_none_or(|d| *d > now)
}

/// Everything the policies may look at when deciding a transition.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSnapshot<'a> {
    /// The content item, as locked.
    pub content: &'a content_item::Model,
    /// Per-option vote counts (polls only, otherwise empty).
    pub vote_counts: &'a [i32],
    /// Checklist progress (needs only, otherwise empty).
    pub checklist: ChecklistProgress,
}

/// Decides whether an item leaves `voting` once its deadline has passed.
pub trait ApprovalPolicy: Send + Sync {
    /// Whether the item is approved.
    fn approves(&self, snapshot: &LifecycleSnapshot<'_>) -> bool;
}

/// Decides whether an active item is complete.
pub trait CompletionPolicy: Send + Sync {
    /// Whether the item is complete at `now`.
    fn is_complete(&self, snapshot: &LifecycleSnapshot<'_>, now: DateTime<Utc>) -> bool;
}

/// Approves unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl ApprovalPolicy for AlwaysApprove {
    fn approves(&self, _snapshot: &LifecycleSnapshot<'_>) -> bool {
        true
    }
}

/// Approves once at least this many votes were cast.
#[derive(Debug, Clone, Copy)]
pub struct MinimumVotes(pub u32);

impl ApprovalPolicy for MinimumVotes {
    fn approves(&self, snapshot: &LifecycleSnapshot<'_>) -> bool {
        let total: i64 = snapshot.vote_counts.iter().map(|c| i64::from(*c)).sum();
        total >= i64::from(self.0)
    }
}

/// Approves when exactly one option leads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearWinner;

impl ApprovalPolicy for ClearWinner {
    fn approves(&self, snapshot: &LifecycleSnapshot<'_>) -> bool {
        let mut counts = snapshot.vote_counts.to_vec();
        counts.sort_unstable_by(|a, b| b.cmp(a));

        match counts.as_slice() {
            [] => false,
            [only] => *only > 0,
            [first, second, ..] => first > second,
        }
    }
}

/// Per-type completion rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCompletion {
    /// Rule for needs.
    pub need_rule: NeedCompletionRule,
}

impl CompletionPolicy for StandardCompletion {
    fn is_complete(&self, snapshot: &LifecycleSnapshot<'_>, now: DateTime<Utc>) -> bool {
        let content = snapshot.content;
        match content.content_type {
            ContentType::Need => {
                let activities_done = snapshot.checklist.is_complete();
                let funding_met = content
                    .funding_goal
                    .is_some_and(|goal| content.current_funding >= goal);

                match self.need_rule {
                    NeedCompletionRule::Activities => activities_done,
                    NeedCompletionRule::Funding => funding_met,
                    NeedCompletionRule::Either => activities_done || funding_met,
                    NeedCompletionRule::Both => activities_done && funding_met,
                }
            }
            ContentType::Event => content.event_date.as_ref().is_some_and(|d| *d <= now),
            ContentType::Poll => deadline_reached(content.voting_deadline.as_ref(), now),
            ContentType::Challenge => content.completion_signaled_at.is_some(),
        }
    }
}

/// The set of policies the lifecycle service consults.
#[derive(Clone)]
pub struct LifecyclePolicies {
    approval: HashMap<ContentType, Arc<dyn ApprovalPolicy>>,
    default_approval: Arc<dyn ApprovalPolicy>,
    completion: Arc<dyn CompletionPolicy>,
}

impl LifecyclePolicies {
    /// Policies derived from configuration.
    ///
    /// Polls need `approval_min_votes` votes; every other type is approved
    /// when its deadline passes.
    #[must_use]
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            approval: HashMap::new(),
            default_approval: Arc::new(AlwaysApprove),
            completion: Arc::new(StandardCompletion {
                need_rule: config.need_completion,
            }),
        }
        .with_approval(ContentType::Poll, MinimumVotes(config.approval_min_votes))
    }

    /// Override the approval policy for one content type.
    #[must_use]
    pub fn with_approval(
        mut self,
        content_type: ContentType,
        policy: impl ApprovalPolicy + 'static,
    ) -> Self {
        self.approval.insert(content_type, Arc::new(policy));
        self
    }

    /// Replace the completion policy.
    #[must_use]
    pub fn with_completion(mut self, policy: impl CompletionPolicy + 'static) -> Self {
        self.completion = Arc::new(policy);
        self
    }

    fn approval_for(&self, content_type: ContentType) -> &dyn ApprovalPolicy {
        self.approval
            .get(&content_type)
            .unwrap_or(&self.default_approval)
            .as_ref()
    }

    /// The automatic transition that applies to `snapshot` at `now`, if any.
    ///
    /// At most one step is returned; `approved` never advances on its own.
    #[must_use]
    pub fn evaluate(
        &self,
        snapshot: &LifecycleSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Option<ContentStatus> {
        let content = snapshot.content;
        match content.status {
            ContentStatus::Voting
                if deadline_reached(content.voting_deadline.as_ref(), now)
                    && self.approval_for(content.content_type).approves(snapshot) =>
            {
                Some(ContentStatus::Approved)
            }
            ContentStatus::Active if self.completion.is_complete(snapshot, now) => {
                Some(ContentStatus::Completed)
            }
            _ => None,
        }
    }
}

impl Default for LifecyclePolicies {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

/// Outcome of a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// Content item ID.
    pub content_id: String,
    /// Status before the call.
    pub from: ContentStatus,
    /// Status after the call.
    pub to: ContentStatus,
}

impl StatusChange {
    /// Whether the status moved.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Outcome of a completion signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignal {
    /// Content item ID.
    pub content_id: String,
    /// Whether this call recorded the signal.
    pub recorded: bool,
    /// Status after the call.
    pub status: ContentStatus,
}

/// Outcome of a lifecycle sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Items examined.
    pub examined: usize,
    /// Items that moved.
    pub advanced: usize,
    /// Items whose evaluation failed.
    pub failed: usize,
    /// Where the next sweep continues; `None` once the scan wrapped around.
    pub resume_after: Option<String>,
}

/// Lifecycle service for status transitions.
#[derive(Clone)]
pub struct LifecycleService {
    content_repo: ContentRepository,
    poll_repo: PollRepository,
    activity_repo: ActivityRepository,
    policies: LifecyclePolicies,
    event_publisher: Option<EventPublisherService>,
}

impl LifecycleService {
    /// Create a new lifecycle service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        poll_repo: PollRepository,
        activity_repo: ActivityRepository,
        policies: LifecyclePolicies,
    ) -> Self {
        Self {
            content_repo,
            poll_repo,
            activity_repo,
            policies,
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Apply the next automatic transition, if one is due.
    pub async fn advance_status(&self, content_id: &str) -> AppResult<StatusChange> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;
        let from = content.status;

        let (vote_counts, checklist) = self.load_inputs(&txn, &content).await?;
        let snapshot = LifecycleSnapshot {
            content: &content,
            vote_counts: &vote_counts,
            checklist,
        };

        let Some(to) = self.policies.evaluate(&snapshot, Utc::now()) else {
            tracing::debug!(content_id = %content_id, status = %from, "No transition due");
            return Ok(StatusChange {
                content_id: content_id.to_string(),
                from,
                to: from,
            });
        };

        self.transition(&txn, &content, to).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        tracing::info!(content_id = %content_id, from = %from, to = %to, "Content advanced");
        publish(
            self.event_publisher.as_ref(),
            ContentChanged::now(content_id, ChangeKind::StatusChanged),
        )
        .await;

        Ok(StatusChange {
            content_id: content_id.to_string(),
            from,
            to,
        })
    }

    /// Advance after a mutation, logging instead of failing.
    pub async fn advance_quietly(&self, content_id: &str) -> Option<StatusChange> {
        match self.advance_status(content_id).await {
            Ok(change) => Some(change),
            Err(e) => {
                tracing::warn!(error = %e, content_id = %content_id, "Failed to advance content status");
                None
            }
        }
    }

    /// Move an approved item to `active`. Only the creator may do this.
    ///
    /// Activating an item that is already active is a no-op.
    pub async fn activate(&self, content_id: &str, actor_id: &str) -> AppResult<StatusChange> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;

        if content.created_by != actor_id {
            return Err(AppError::Forbidden(
                "Only the creator can activate this content".to_string(),
            ));
        }

        let from = content.status;
        if from == ContentStatus::Active {
            tracing::debug!(content_id = %content_id, "Content already active");
            return Ok(StatusChange {
                content_id: content_id.to_string(),
                from,
                to: from,
            });
        }

        self.transition(&txn, &content, ContentStatus::Active).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        tracing::info!(content_id = %content_id, actor_id = %actor_id, "Content activated");
        publish(
            self.event_publisher.as_ref(),
            ContentChanged::now(content_id, ChangeKind::StatusChanged),
        )
        .await;

        Ok(StatusChange {
            content_id: content_id.to_string(),
            from,
            to: ContentStatus::Active,
        })
    }

    /// Record the external completion signal of a challenge.
    pub async fn signal_completion(
        &self,
        content_id: &str,
        actor_id: &str,
    ) -> AppResult<CompletionSignal> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;

        if content.content_type != ContentType::Challenge {
            return Err(AppError::ContentTypeMismatch {
                expected: ContentType::Challenge.to_string(),
                actual: content.content_type.to_string(),
            });
        }
        if content.created_by != actor_id {
            return Err(AppError::Forbidden(
                "Only the creator can signal completion".to_string(),
            ));
        }
        if content.completion_signaled_at.is_some() {
            tracing::debug!(content_id = %content_id, "Completion already signaled");
            return Ok(CompletionSignal {
                content_id: content_id.to_string(),
                recorded: false,
                status: content.status,
            });
        }

        let recorded = self
            .content_repo
            .mark_completion_signaled(&txn, content_id, Utc::now())
            .await?;
        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        let mut status = content.status;
        if recorded {
            tracing::info!(content_id = %content_id, "Completion signaled");
            publish(
                self.event_publisher.as_ref(),
                ContentChanged::now(content_id, ChangeKind::CompletionSignaled),
            )
            .await;
            if let Some(change) = self.advance_quietly(content_id).await {
                status = change.to;
            }
        }

        Ok(CompletionSignal {
            content_id: content_id.to_string(),
            recorded,
            status,
        })
    }

    /// Advance items that may be due, up to `batch_size` of them.
    ///
    /// Candidates are scanned in ID order starting after `after_id`. A full
    /// page reports its last ID in [`SweepReport::resume_after`] so items
    /// that cannot move yet do not hide the ones behind them.
    pub async fn sweep(&self, batch_size: u64, after_id: Option<&str>) -> AppResult<SweepReport> {
        let due = self
            .content_repo
            .find_due_for_advance(Utc::now(), after_id, batch_size)
            .await?;

        let resume_after = if due.len() as u64 >= batch_size {
            due.last().map(|c| c.id.clone())
        } else {
            None
        };
        let mut report = SweepReport {
            examined: due.len(),
            resume_after,
            ..SweepReport::default()
        };

        for content in due {
            match self.advance_status(&content.id).await {
                Ok(change) if change.changed() => report.advanced += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, content_id = %content.id, "Sweep failed to advance content");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn load_inputs<C: ConnectionTrait>(
        &self,
        conn: &C,
        content: &content_item::Model,
    ) -> AppResult<(Vec<i32>, ChecklistProgress)> {
        let vote_counts = if content.content_type == ContentType::Poll
            && content.status == ContentStatus::Voting
        {
            self.poll_repo
                .find_options(conn, &content.id)
                .await?
                .iter()
                .map(|o| o.vote_count)
                .collect()
        } else {
            Vec::new()
        };

        let checklist = if content.content_type == ContentType::Need
            && content.status == ContentStatus::Active
        {
            let activities = self.activity_repo.find_by_content(conn, &content.id).await?;
            ChecklistProgress::from_activities(&activities)
        } else {
            ChecklistProgress::default()
        };

        Ok((vote_counts, checklist))
    }

    async fn transition<C: ConnectionTrait>(
        &self,
        conn: &C,
        content: &content_item::Model,
        to: ContentStatus,
    ) -> AppResult<()> {
        check_transition(content.status, to)?;

        let updated = self
            .content_repo
            .update_status(conn, &content.id, content.status, to)
            .await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "Content {} changed status concurrently",
                content.id
            )));
        }

        Ok(())
    }
}
