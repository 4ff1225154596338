//! Need activity repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::{NeedActivity, need_activity};

/// Repository for need checklist activities.
#[derive(Clone)]
pub struct ActivityRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityRepository {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the checklist of a new need.
    pub async fn insert_many<C: ConnectionTrait>(
        &self,
        conn: &C,
        activities: Vec<need_activity::ActiveModel>,
    ) -> AppResult<()> {
        if activities.is_empty() {
            return Ok(());
        }

        NeedActivity::insert_many(activities)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Find activity by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<need_activity::Model>> {
        NeedActivity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Get activity by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<need_activity::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity not found: {id}")))
    }

    /// Activities of a need in checklist order.
    pub async fn find_by_content<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
    ) -> AppResult<Vec<need_activity::Model>> {
        NeedActivity::find()
            .filter(need_activity::Column::ContentId.eq(content_id))
            .order_by(need_activity::Column::Position, Order::Asc)
            .all(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Activities of a need, outside any transaction.
    pub async fn list_by_content(&self, content_id: &str) -> AppResult<Vec<need_activity::Model>> {
        self.find_by_content(self.db.as_ref(), content_id).await
    }

    /// Mark an activity completed.
    ///
    /// Only applies to an incomplete activity, so the first completer and
    /// timestamp are kept. Returns whether a row changed.
    pub async fn mark_completed(
        &self,
        id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = NeedActivity::update_many()
            .col_expr(need_activity::Column::IsCompleted, Expr::value(true))
            .col_expr(need_activity::Column::CompletedBy, Expr::value(user_id))
            .col_expr(
                need_activity::Column::CompletedAt,
                Expr::value(DateTimeWithTimeZone::from(at)),
            )
            .filter(need_activity::Column::Id.eq(id))
            .filter(need_activity::Column::IsCompleted.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Clear an activity's completion. Returns whether a row changed.
    pub async fn mark_incomplete(&self, id: &str) -> AppResult<bool> {
        let result = NeedActivity::update_many()
            .col_expr(need_activity::Column::IsCompleted, Expr::value(false))
            .col_expr(
                need_activity::Column::CompletedBy,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                need_activity::Column::CompletedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .filter(need_activity::Column::Id.eq(id))
            .filter(need_activity::Column::IsCompleted.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_activity(id: &str, position: i32, done: bool) -> need_activity::Model {
        need_activity::Model {
            id: id.to_string(),
            content_id: "need1".to_string(),
            title: format!("Step {position}"),
            position,
            is_completed: done,
            completed_by: done.then(|| "user1".to_string()),
            completed_at: done.then(|| Utc::now().into()),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<need_activity::Model>::new()])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_content() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_activity("a1", 0, true),
                    create_test_activity("a2", 1, false),
                ]])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        let activities = repo.list_by_content("need1").await.unwrap();

        assert_eq!(activities.len(), 2);
        assert!(activities[0].is_completed);
        assert!(!activities[1].is_completed);
    }

    #[tokio::test]
    async fn test_mark_completed_reports_noop() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        assert!(repo.mark_completed("a1", "user1", Utc::now()).await.unwrap());
        assert!(!repo.mark_completed("a1", "user2", Utc::now()).await.unwrap());
    }
}
