//! Poll service: one vote per user, change of mind allowed.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{
    entities::{
        content_item::{self, ContentStatus, ContentType},
        poll_option, poll_vote,
    },
    repositories::{ContentRepository, PollRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Serialize;

use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};
use crate::services::lifecycle::vote_window_open;

/// What a vote request has to do to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotePlan {
    /// The user already voted for this option.
    Unchanged,
    /// First vote by this user.
    Insert,
    /// Move the user's vote away from `from`.
    Switch {
        /// Previously chosen option.
        from: String,
    },
}

/// Decide how a vote for `option_id` applies given the user's current choice.
#[must_use]
pub fn plan_vote(current: Option<&str>, option_id: &str) -> VotePlan {
    match current {
        None => VotePlan::Insert,
        Some(current) if current == option_id => VotePlan::Unchanged,
        Some(current) => VotePlan::Switch {
            from: current.to_string(),
        },
    }
}

/// Fail unless `content` accepts votes at `now`.
pub fn ensure_votable(content: &content_item::Model, now: DateTime<Utc>) -> AppResult<()> {
    if content.content_type != ContentType::Poll || content.status != ContentStatus::Voting {
        return Err(AppError::ContentNotVotable(content.id.clone()));
    }
    if !vote_window_open(content, now) {
        return Err(AppError::VoteWindowClosed(content.id.clone()));
    }
    Ok(())
}

/// One option with its count and share of all votes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    /// Option ID.
    pub option_id: String,
    /// Option text.
    pub text: String,
    /// Display position.
    pub position: i32,
    /// Votes for this option.
    pub votes: i32,
    /// `votes / total`, 0 when nobody voted.
    pub ratio: f64,
}

/// Tally options, keeping their order.
#[must_use]
pub fn tally(options: &[poll_option::Model]) -> Vec<OptionTally> {
    let total: i64 = options.iter().map(|o| i64::from(o.vote_count)).sum();

    options
        .iter()
        .map(|o| OptionTally {
            option_id: o.id.clone(),
            text: o.text.clone(),
            position: o.position,
            votes: o.vote_count,
            ratio: if total == 0 {
                0.0
            } else {
                f64::from(o.vote_count) / total as f64
            },
        })
        .collect()
}

/// Result of casting a vote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    /// Poll content ID.
    pub content_id: String,
    /// The user's choice after the call.
    pub option_id: String,
    /// Per-option counts after the call.
    pub options: Vec<OptionTally>,
    /// Whether this call changed anything.
    pub changed: bool,
}

/// Current state of a poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    /// Poll content ID.
    pub content_id: String,
    /// Poll status.
    pub status: ContentStatus,
    /// Options with counts.
    pub options: Vec<OptionTally>,
    /// Number of users who voted.
    pub voters_count: u64,
    /// The viewer's current choice.
    pub my_choice: Option<String>,
    /// Whether votes are no longer accepted.
    pub is_closed: bool,
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    content_repo: ContentRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
    event_publisher: Option<EventPublisherService>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(content_repo: ContentRepository, poll_repo: PollRepository) -> Self {
        Self {
            content_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Cast or change `user_id`'s vote on a poll.
    pub async fn cast_vote(
        &self,
        content_id: &str,
        user_id: &str,
        option_id: &str,
    ) -> AppResult<VoteResult> {
        let txn = self.content_repo.begin().await?;
        let content = self.content_repo.lock_by_id(&txn, content_id).await?;
        ensure_votable(&content, Utc::now())?;

        let option = self
            .poll_repo
            .find_option(&txn, option_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll option not found: {option_id}")))?;
        if option.content_id != content_id {
            return Err(AppError::InvalidOption {
                content_id: content_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        let existing = self.poll_repo.find_vote(&txn, content_id, user_id).await?;
        let plan = plan_vote(existing.as_ref().map(|v| v.option_id.as_str()), option_id);

        match (&plan, existing) {
            (VotePlan::Unchanged, _) => {}
            (VotePlan::Insert, _) => {
                let vote = poll_vote::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    content_id: Set(content_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    option_id: Set(option_id.to_string()),
                    created_at: Set(Utc::now().into()),
                    updated_at: Set(None),
                };
                self.poll_repo.insert_vote(&txn, vote).await?;
                self.poll_repo.adjust_vote_count(&txn, option_id, 1).await?;
            }
            (VotePlan::Switch { from }, Some(vote)) => {
                self.poll_repo.move_vote(&txn, &vote.id, option_id).await?;
                self.poll_repo.adjust_vote_count(&txn, from, -1).await?;
                self.poll_repo.adjust_vote_count(&txn, option_id, 1).await?;
            }
            (VotePlan::Switch { .. }, None) => {
                return Err(AppError::Internal(
                    "vote switch planned without an existing vote".to_string(),
                ));
            }
        }

        let changed = plan != VotePlan::Unchanged;
        let options = self.poll_repo.find_options(&txn, content_id).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        if changed {
            tracing::info!(content_id = %content_id, user_id = %user_id, option_id = %option_id, "Vote cast");
            publish(
                self.event_publisher.as_ref(),
                ContentChanged::now(content_id, ChangeKind::VoteCast),
            )
            .await;
        } else {
            tracing::debug!(content_id = %content_id, user_id = %user_id, "Vote unchanged");
        }

        Ok(VoteResult {
            content_id: content_id.to_string(),
            option_id: option_id.to_string(),
            options: tally(&options),
            changed,
        })
    }

    /// Current tallies of a poll, with the viewer's choice if known.
    pub async fn poll_results(
        &self,
        content_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<PollResults> {
        let content = self.content_repo.get_by_id(content_id).await?;
        if content.content_type != ContentType::Poll {
            return Err(AppError::ContentTypeMismatch {
                expected: ContentType::Poll.to_string(),
                actual: content.content_type.to_string(),
            });
        }

        let options = self.poll_repo.find_options_by_content(content_id).await?;
        let voters_count = self.poll_repo.count_voters(content_id).await?;
        let my_choice = match viewer_id {
            Some(user_id) => self
                .poll_repo
                .find_vote_by_user(content_id, user_id)
                .await?
                .map(|v| v.option_id),
            None => None,
        };

        Ok(PollResults {
            content_id: content_id.to_string(),
            status: content.status,
            options: tally(&options),
            voters_count,
            my_choice,
            is_closed: !vote_window_open(&content, Utc::now()),
        })
    }
}
