//! Content item entity: needs, events, challenges and polls.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of content item. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Seeks funding and/or completion of activities.
    #[sea_orm(string_value = "need")]
    Need,
    /// A dated gathering with optional capacity.
    #[sea_orm(string_value = "event")]
    Event,
    /// Completed by an external signal.
    #[sea_orm(string_value = "challenge")]
    Challenge,
    /// A vote between fixed options.
    #[sea_orm(string_value = "poll")]
    Poll,
}

impl ContentType {
    /// Lower-case name, as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Need => "need",
            Self::Event => "event",
            Self::Challenge => "challenge",
            Self::Poll => "poll",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a content item.
///
/// Variants are declared in lifecycle order; the derived `Ord` follows it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    /// Being assembled; sub-records not yet persisted.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Open for votes.
    #[sea_orm(string_value = "voting")]
    Voting,
    /// Accepted by the community, waiting to start.
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Underway.
    #[sea_orm(string_value = "active")]
    Active,
    /// Finished. Terminal.
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl ContentStatus {
    /// Lower-case name, as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Voting => "voting",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "content_item")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub content_type: ContentType,

    #[sea_orm(indexed)]
    pub status: ContentStatus,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Funding goal in minor currency units.
    #[sea_orm(nullable)]
    pub funding_goal: Option<i64>,

    /// Running sum of funding transactions, in minor currency units.
    pub current_funding: i64,

    #[sea_orm(nullable)]
    pub voting_deadline: Option<DateTimeWithTimeZone>,

    /// Event start (events only).
    #[sea_orm(nullable)]
    pub event_date: Option<DateTimeWithTimeZone>,

    /// Registration cap (events only).
    #[sea_orm(nullable)]
    pub max_participants: Option<i32>,

    /// When the external completion signal arrived (challenges only).
    #[sea_orm(nullable)]
    pub completion_signaled_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(indexed)]
    pub created_by: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,
    #[sea_orm(has_many = "super::poll_vote::Entity")]
    PollVote,
    #[sea_orm(has_many = "super::event_registration::Entity")]
    EventRegistration,
    #[sea_orm(has_many = "super::need_activity::Entity")]
    NeedActivity,
    #[sea_orm(has_many = "super::funding_transaction::Entity")]
    FundingTransaction,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::poll_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollVote.def()
    }
}

impl Related<super::event_registration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventRegistration.def()
    }
}

impl Related<super::need_activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NeedActivity.def()
    }
}

impl Related<super::funding_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FundingTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order_follows_lifecycle() {
        assert!(ContentStatus::Draft < ContentStatus::Voting);
        assert!(ContentStatus::Voting < ContentStatus::Approved);
        assert!(ContentStatus::Approved < ContentStatus::Active);
        assert!(ContentStatus::Active < ContentStatus::Completed);
    }

    #[test]
    fn test_serde_names_match_stored_values() {
        assert_eq!(
            serde_json::to_string(&ContentType::Challenge).ok().as_deref(),
            Some("\"challenge\"")
        );
        assert_eq!(ContentStatus::Approved.to_string(), "approved");
    }
}
