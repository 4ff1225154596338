//! Content service: creation and read views.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{
    entities::{
        content_item::{self, ContentStatus, ContentType},
        need_activity, poll_option,
    },
    repositories::{ActivityRepository, ContentRepository, PollRepository, RegistrationRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};

use crate::services::activity::ChecklistProgress;
use crate::services::event_publisher::{
    ChangeKind, ContentChanged, EventPublisherService, publish,
};
use crate::services::funding::funding_progress;
use crate::services::lifecycle::{check_transition, vote_window_open};
use crate::services::poll::{OptionTally, tally};

/// Maximum title length.
pub const MAX_TITLE_LEN: usize = 256;
/// Minimum number of poll options.
pub const MIN_POLL_OPTIONS: usize = 2;
/// Maximum number of poll options.
pub const MAX_POLL_OPTIONS: usize = 10;
/// Maximum poll option length.
pub const MAX_OPTION_LEN: usize = 100;
/// Maximum number of activities on a need.
pub const MAX_ACTIVITIES: usize = 50;

/// Type-specific fields of a new content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum NewContentKind {
    /// A need with optional funding goal and checklist.
    Need {
        /// Goal in minor currency units.
        funding_goal: Option<i64>,
        /// Checklist activity titles, in order.
        #[serde(default)]
        activities: Vec<String>,
    },
    /// A dated event with optional capacity.
    Event {
        /// When the event takes place.
        event_date: DateTime<Utc>,
        /// Registration cap.
        max_participants: Option<i32>,
        /// Goal in minor currency units.
        funding_goal: Option<i64>,
    },
    /// A challenge completed by an external signal.
    Challenge {
        /// Goal in minor currency units.
        funding_goal: Option<i64>,
    },
    /// A poll between fixed options.
    Poll {
        /// Option texts, in order.
        options: Vec<String>,
    },
}

impl NewContentKind {
    /// The stored content type.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::Need { .. } => ContentType::Need,
            Self::Event { .. } => ContentType::Event,
            Self::Challenge { .. } => ContentType::Challenge,
            Self::Poll { .. } => ContentType::Poll,
        }
    }

    const fn funding_goal(&self) -> Option<i64> {
        match self {
            Self::Need { funding_goal, .. }
            | Self::Event { funding_goal, .. }
            | Self::Challenge { funding_goal } => *funding_goal,
            Self::Poll { .. } => None,
        }
    }
}

/// Input for creating a content item.
#[derive(Debug, Clone)]
pub struct CreateContentInput {
    /// Title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// End of the voting window; open-ended when absent.
    pub voting_deadline: Option<DateTime<Utc>>,
    /// Type-specific fields.
    pub kind: NewContentKind,
}

/// Validate a creation request at `now`.
pub fn validate_new_content(input: &CreateContentInput, now: DateTime<Utc>) -> AppResult<()> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title is too long (max {MAX_TITLE_LEN} chars)"
        )));
    }
    if input.voting_deadline.is_some_and(|d| d <= now) {
        return Err(AppError::Validation(
            "votingDeadline must be in the future".to_string(),
        ));
    }
    if input.kind.funding_goal().is_some_and(|g| g <= 0) {
        return Err(AppError::Validation(
            "fundingGoal must be greater than zero".to_string(),
        ));
    }

    match &input.kind {
        NewContentKind::Need { activities, .. } => {
            if activities.len() > MAX_ACTIVITIES {
                return Err(AppError::Validation(format!(
                    "a need can have at most {MAX_ACTIVITIES} activities"
                )));
            }
            for activity in activities {
                let activity = activity.trim();
                if activity.is_empty() || activity.chars().count() > MAX_TITLE_LEN {
                    return Err(AppError::Validation(format!(
                        "activity titles must be 1-{MAX_TITLE_LEN} chars"
                    )));
                }
            }
        }
        NewContentKind::Event {
            max_participants, ..
        } => {
            if max_participants.is_some_and(|m| m <= 0) {
                return Err(AppError::Validation(
                    "maxParticipants must be greater than zero".to_string(),
                ));
            }
        }
        NewContentKind::Challenge { .. } => {}
        NewContentKind::Poll { options } => {
            if options.len() < MIN_POLL_OPTIONS {
                return Err(AppError::Validation(format!(
                    "a poll needs at least {MIN_POLL_OPTIONS} options"
                )));
            }
            if options.len() > MAX_POLL_OPTIONS {
                return Err(AppError::Validation(format!(
                    "a poll can have at most {MAX_POLL_OPTIONS} options"
                )));
            }
            for option in options {
                let option = option.trim();
                if option.is_empty() {
                    return Err(AppError::Validation(
                        "poll options cannot be empty".to_string(),
                    ));
                }
                if option.chars().count() > MAX_OPTION_LEN {
                    return Err(AppError::Validation(format!(
                        "poll option is too long (max {MAX_OPTION_LEN} chars)"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Funding totals as shown on a content item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingView {
    /// Goal, if any.
    pub goal: Option<i64>,
    /// Running total.
    pub current: i64,
    /// `min(current / goal, 1)`, if there is a goal.
    pub progress: Option<f64>,
}

impl FundingView {
    fn of(content: &content_item::Model) -> Self {
        Self {
            goal: content.funding_goal,
            current: content.current_funding,
            progress: funding_progress(content.current_funding, content.funding_goal),
        }
    }
}

/// Type-specific state of a content item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ContentDetails {
    /// Need state.
    Need {
        /// Funding totals.
        funding: FundingView,
        /// Checklist in order.
        activities: Vec<need_activity::Model>,
        /// Checklist progress.
        checklist: ChecklistProgress,
    },
    /// Event state.
    Event {
        /// When the event takes place.
        event_date: Option<DateTimeWithTimeZone>,
        /// Registration cap.
        max_participants: Option<i32>,
        /// Active registrations.
        registered_count: u64,
        /// Funding totals.
        funding: FundingView,
    },
    /// Challenge state.
    Challenge {
        /// When the completion signal arrived.
        completion_signaled_at: Option<DateTimeWithTimeZone>,
        /// Funding totals.
        funding: FundingView,
    },
    /// Poll state.
    Poll {
        /// Options with counts.
        options: Vec<OptionTally>,
        /// The viewer's current choice.
        my_choice: Option<String>,
        /// Whether votes are no longer accepted.
        is_closed: bool,
    },
}

/// A content item with its type-specific state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    /// The stored item.
    pub content: content_item::Model,
    /// Type-specific state.
    pub details: ContentDetails,
}

/// Filter for listing content.
#[derive(Debug, Clone, Default)]
pub struct ContentListFilter {
    /// Only this type.
    pub content_type: Option<ContentType>,
    /// Only this status.
    pub status: Option<ContentStatus>,
    /// Items with IDs lower than this (pagination cursor).
    pub until_id: Option<String>,
    /// Page size.
    pub limit: u64,
}

/// Content service for creating and reading content items.
#[derive(Clone)]
pub struct ContentService {
    content_repo: ContentRepository,
    poll_repo: PollRepository,
    activity_repo: ActivityRepository,
    registration_repo: RegistrationRepository,
    id_gen: IdGenerator,
    event_publisher: Option<EventPublisherService>,
}

impl ContentService {
    /// Create a new content service.
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        poll_repo: PollRepository,
        activity_repo: ActivityRepository,
        registration_repo: RegistrationRepository,
    ) -> Self {
        Self {
            content_repo,
            poll_repo,
            activity_repo,
            registration_repo,
            id_gen: IdGenerator::new(),
            event_publisher: None,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create a content item with its options or activities.
    ///
    /// The item is written as `draft`, its sub-records are added, and it is
    /// moved to `voting` before the transaction commits.
    pub async fn create(
        &self,
        creator_id: &str,
        input: CreateContentInput,
    ) -> AppResult<ContentView> {
        let now = Utc::now();
        validate_new_content(&input, now)?;

        let content_type = input.kind.content_type();
        let (event_date, max_participants) = match &input.kind {
            NewContentKind::Event {
                event_date,
                max_participants,
                ..
            } => (Some((*event_date).into()), *max_participants),
            _ => (None, None),
        };

        let id = self.id_gen.generate();
        let model = content_item::ActiveModel {
            id: Set(id.clone()),
            content_type: Set(content_type),
            status: Set(ContentStatus::Draft),
            title: Set(input.title.trim().to_string()),
            description: Set(input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())),
            funding_goal: Set(input.kind.funding_goal()),
            current_funding: Set(0),
            voting_deadline: Set(input.voting_deadline.map(Into::into)),
            event_date: Set(event_date),
            max_participants: Set(max_participants),
            completion_signaled_at: Set(None),
            created_by: Set(creator_id.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let txn = self.content_repo.begin().await?;
        let mut content = self.content_repo.insert(&txn, model).await?;

        let details = match input.kind {
            NewContentKind::Poll { options } => {
                let options: Vec<poll_option::Model> = options
                    .into_iter()
                    .enumerate()
                    .map(|(position, text)| poll_option::Model {
                        id: self.id_gen.generate(),
                        content_id: id.clone(),
                        text: text.trim().to_string(),
                        position: position as i32,
                        vote_count: 0,
                    })
                    .collect();
                self.poll_repo
                    .insert_options(&txn, options.iter().map(option_active).collect())
                    .await?;
                ContentDetails::Poll {
                    options: tally(&options),
                    my_choice: None,
                    is_closed: false,
                }
            }
            NewContentKind::Need { activities, .. } => {
                let activities: Vec<need_activity::Model> = activities
                    .into_iter()
                    .enumerate()
                    .map(|(position, title)| need_activity::Model {
                        id: self.id_gen.generate(),
                        content_id: id.clone(),
                        title: title.trim().to_string(),
                        position: position as i32,
                        is_completed: false,
                        completed_by: None,
                        completed_at: None,
                    })
                    .collect();
                self.activity_repo
                    .insert_many(&txn, activities.iter().map(activity_active).collect())
                    .await?;
                let checklist = ChecklistProgress::from_activities(&activities);
                ContentDetails::Need {
                    funding: FundingView::of(&content),
                    activities,
                    checklist,
                }
            }
            NewContentKind::Event { .. } => ContentDetails::Event {
                event_date: content.event_date,
                max_participants: content.max_participants,
                registered_count: 0,
                funding: FundingView::of(&content),
            },
            NewContentKind::Challenge { .. } => ContentDetails::Challenge {
                completion_signaled_at: None,
                funding: FundingView::of(&content),
            },
        };

        check_transition(content.status, ContentStatus::Voting)?;
        self.content_repo
            .update_status(&txn, &id, ContentStatus::Draft, ContentStatus::Voting)
            .await?;
        txn.commit()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
        content.status = ContentStatus::Voting;

        tracing::info!(content_id = %id, content_type = %content_type, creator_id = %creator_id, "Content created");
        publish(
            self.event_publisher.as_ref(),
            ContentChanged::now(id, ChangeKind::Created),
        )
        .await;

        Ok(ContentView { content, details })
    }

    /// Load a content item with its type-specific state.
    pub async fn show(&self, content_id: &str, viewer_id: Option<&str>) -> AppResult<ContentView> {
        let content = self.content_repo.get_by_id(content_id).await?;

        let details = match content.content_type {
            ContentType::Poll => {
                let options = self.poll_repo.find_options_by_content(content_id).await?;
                let my_choice = match viewer_id {
                    Some(user_id) => self
                        .poll_repo
                        .find_vote_by_user(content_id, user_id)
                        .await?
                        .map(|v| v.option_id),
                    None => None,
                };
                ContentDetails::Poll {
                    options: tally(&options),
                    my_choice,
                    is_closed: !vote_window_open(&content, Utc::now()),
                }
            }
            ContentType::Need => {
                let activities = self.activity_repo.list_by_content(content_id).await?;
                let checklist = ChecklistProgress::from_activities(&activities);
                ContentDetails::Need {
                    funding: FundingView::of(&content),
                    activities,
                    checklist,
                }
            }
            ContentType::Event => ContentDetails::Event {
                event_date: content.event_date,
                max_participants: content.max_participants,
                registered_count: self
                    .registration_repo
                    .count_active_by_content(content_id)
                    .await?,
                funding: FundingView::of(&content),
            },
            ContentType::Challenge => ContentDetails::Challenge {
                completion_signaled_at: content.completion_signaled_at,
                funding: FundingView::of(&content),
            },
        };

        Ok(ContentView { content, details })
    }

    /// List content items, newest first.
    pub async fn list(&self, filter: ContentListFilter) -> AppResult<Vec<content_item::Model>> {
        self.content_repo
            .find_recent(
                filter.content_type,
                filter.status,
                filter.limit.clamp(1, 100),
                filter.until_id.as_deref(),
            )
            .await
    }
}

fn option_active(option: &poll_option::Model) -> poll_option::ActiveModel {
    poll_option::ActiveModel {
        id: Set(option.id.clone()),
        content_id: Set(option.content_id.clone()),
        text: Set(option.text.clone()),
        position: Set(option.position),
        vote_count: Set(option.vote_count),
    }
}

fn activity_active(activity: &need_activity::Model) -> need_activity::ActiveModel {
    need_activity::ActiveModel {
        id: Set(activity.id.clone()),
        content_id: Set(activity.content_id.clone()),
        title: Set(activity.title.clone()),
        position: Set(activity.position),
        is_completed: Set(activity.is_completed),
        completed_by: Set(activity.completed_by.clone()),
        completed_at: Set(activity.completed_at),
    }
}
