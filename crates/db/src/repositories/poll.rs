//! Poll option and vote repository.

use std::sync::Arc;

use crate::entities::{PollOption, PollVote, poll_option, poll_vote};
use super::insert_error;
use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

/// Poll repository for options and votes.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Options ====================

    /// Insert the options of a new poll.
    pub async fn insert_options<C: ConnectionTrait>(
        &self,
        conn: &C,
        options: Vec<poll_option::ActiveModel>,
    ) -> AppResult<()> {
        if options.is_empty() {
            return Ok(());
        }

        PollOption::insert_many(options)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Find an option by ID.
    pub async fn find_option<C: ConnectionTrait>(
        &self,
        conn: &C,
        option_id: &str,
    ) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(option_id)
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Options of a poll in display order.
    pub async fn find_options<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
    ) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::ContentId.eq(content_id))
            .order_by(poll_option::Column::Position, Order::Asc)
            .all(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Options of a poll in display order, outside any transaction.
    pub async fn find_options_by_content(
        &self,
        content_id: &str,
    ) -> AppResult<Vec<poll_option::Model>> {
        self.find_options(self.db.as_ref(), content_id).await
    }

    /// Adjust an option's cached vote count atomically.
    pub async fn adjust_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        option_id: &str,
        delta: i32,
    ) -> AppResult<()> {
        PollOption::update_many()
            .col_expr(
                poll_option::Column::VoteCount,
                Expr::col(poll_option::Column::VoteCount).add(delta),
            )
            .filter(poll_option::Column::Id.eq(option_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    // ==================== Votes ====================

    /// Find a user's vote on a poll.
    pub async fn find_vote<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<Option<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::ContentId.eq(content_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Find a user's vote on a poll, outside any transaction.
    pub async fn find_vote_by_user(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<Option<poll_vote::Model>> {
        self.find_vote(self.db.as_ref(), content_id, user_id).await
    }

    /// Insert a vote.
    pub async fn insert_vote<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll_vote::ActiveModel,
    ) -> AppResult<poll_vote::Model> {
        model
            .insert(conn)
            .await
            .map_err(insert_error)
    }

    /// Point an existing vote at another option.
    pub async fn move_vote<C: ConnectionTrait>(
        &self,
        conn: &C,
        vote_id: &str,
        option_id: &str,
    ) -> AppResult<()> {
        PollVote::update_many()
            .col_expr(poll_vote::Column::OptionId, Expr::value(option_id))
            .col_expr(
                poll_vote::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(poll_vote::Column::Id.eq(vote_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Count distinct voters on a poll.
    pub async fn count_voters(&self, content_id: &str) -> AppResult<u64> {
        PollVote::find()
            .filter(poll_vote::Column::ContentId.eq(content_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }
}
