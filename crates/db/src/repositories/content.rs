//! Content item repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select,
    TransactionTrait, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::content_item::{ContentStatus, ContentType};
use crate::entities::{ContentItem, content_item};

/// Repository for content items.
///
/// Mutating methods take the connection explicitly so they can run inside
/// a transaction opened with [`ContentRepository::begin`].
#[derive(Clone)]
pub struct ContentRepository {
    db: Arc<DatabaseConnection>,
}

impl ContentRepository {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Open a transaction.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Find content item by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<content_item::Model>> {
        ContentItem::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Get content item by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<content_item::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Content not found: {id}")))
    }

    /// Load a content item and hold a row lock on it until the surrounding
    /// transaction ends.
    pub async fn lock_by_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<content_item::Model> {
        ContentItem::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Content not found: {id}")))
    }

    /// Insert a content item.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: content_item::ActiveModel,
    ) -> AppResult<content_item::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Move a content item from `from` to `to`.
    ///
    /// The update only applies while the stored status still equals `from`;
    /// returns whether a row changed.
    pub async fn update_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        from: ContentStatus,
        to: ContentStatus,
    ) -> AppResult<bool> {
        let result = ContentItem::update_many()
            .col_expr(content_item::Column::Status, Expr::value(to))
            .col_expr(
                content_item::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(content_item::Column::Id.eq(id))
            .filter(content_item::Column::Status.eq(from))
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Add `amount` to the cached funding total atomically.
    pub async fn add_funding<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        amount: i64,
    ) -> AppResult<()> {
        ContentItem::update_many()
            .col_expr(
                content_item::Column::CurrentFunding,
                Expr::col(content_item::Column::CurrentFunding).add(amount),
            )
            .filter(content_item::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Overwrite the cached funding total.
    pub async fn set_current_funding<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        total: i64,
    ) -> AppResult<()> {
        ContentItem::update_many()
            .col_expr(content_item::Column::CurrentFunding, Expr::value(total))
            .filter(content_item::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Record the external completion signal.
    ///
    /// Only the first signal is stored; returns whether this call set it.
    pub async fn mark_completion_signaled<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = ContentItem::update_many()
            .col_expr(
                content_item::Column::CompletionSignaledAt,
                Expr::value(DateTimeWithTimeZone::from(at)),
            )
            .filter(content_item::Column::Id.eq(id))
            .filter(content_item::Column::CompletionSignaledAt.is_null())
            .exec(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Find items that may be due for an automatic transition, in ID order.
    ///
    /// Only rows whose own columns allow a move are returned: voting items
    /// with no deadline or a passed one, active events and polls past their
    /// date, signaled challenges, and every active need (needs depend on
    /// funding and activities). Pass the last ID of the previous page as
    /// `after_id` to continue a scan. Whether a transition actually applies
    /// is decided by the lifecycle service.
    pub async fn find_due_for_advance(
        &self,
        now: DateTime<Utc>,
        after_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<content_item::Model>> {
        due_for_advance(now, after_id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// List content items, newest first.
    pub async fn find_recent(
        &self,
        content_type: Option<ContentType>,
        status: Option<ContentStatus>,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<content_item::Model>> {
        let mut query = ContentItem::find();

        if let Some(content_type) = content_type {
            query = query.filter(content_item::Column::ContentType.eq(content_type));
        }
        if let Some(status) = status {
            query = query.filter(content_item::Column::Status.eq(status));
        }
        if let Some(id) = until_id {
            query = query.filter(content_item::Column::Id.lt(id));
        }

        query
            .order_by(content_item::Column::Id, Order::Desc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }
}

fn due_for_advance(now: DateTime<Utc>, after_id: Option<&str>) -> Select<ContentItem> {
    let now: DateTimeWithTimeZone = now.into();
    let deadline_passed = Condition::any()
        .add(content_item::Column::VotingDeadline.is_null())
        .add(content_item::Column::VotingDeadline.lte(now));
    let of_type = |content_type: ContentType| {
        Condition::all().add(content_item::Column::ContentType.eq(content_type))
    };

    let voting = Condition::all()
        .add(content_item::Column::Status.eq(ContentStatus::Voting))
        .add(deadline_passed.clone());
    let active = Condition::all()
        .add(content_item::Column::Status.eq(ContentStatus::Active))
        .add(
            Condition::any()
                .add(of_type(ContentType::Need))
                .add(of_type(ContentType::Event).add(content_item::Column::EventDate.lte(now)))
                .add(of_type(ContentType::Poll).add(deadline_passed))
                .add(
                    of_type(ContentType::Challenge)
                        .add(content_item::Column::CompletionSignaledAt.is_not_null()),
                ),
        );

    let mut query = ContentItem::find().filter(Condition::any().add(voting).add(active));
    if let Some(id) = after_id {
        query = query.filter(content_item::Column::Id.gt(id));
    }
    query.order_by(content_item::Column::Id, Order::Asc)
}
