//! Event registration repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, prelude::DateTimeWithTimeZone, sea_query::Expr,
};

use crate::entities::event_registration::RegistrationStatus;
use crate::entities::{EventRegistration, event_registration};
use super::insert_error;

/// Repository for event registrations.
#[derive(Clone)]
pub struct RegistrationRepository {
    db: Arc<DatabaseConnection>,
}

impl RegistrationRepository {
    /// Create a new registration repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's registration row for an event.
    pub async fn find<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<Option<event_registration::Model>> {
        EventRegistration::find()
            .filter(event_registration::Column::ContentId.eq(content_id))
            .filter(event_registration::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Find a user's registration row, outside any transaction.
    pub async fn find_by_user(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> AppResult<Option<event_registration::Model>> {
        self.find(self.db.as_ref(), content_id, user_id).await
    }

    /// Count active registrations for an event.
    pub async fn count_active<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
    ) -> AppResult<u64> {
        EventRegistration::find()
            .filter(event_registration::Column::ContentId.eq(content_id))
            .filter(event_registration::Column::Status.eq(RegistrationStatus::Registered))
            .count(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Count active registrations, outside any transaction.
    pub async fn count_active_by_content(&self, content_id: &str) -> AppResult<u64> {
        self.count_active(self.db.as_ref(), content_id).await
    }

    /// Insert a registration.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: event_registration::ActiveModel,
    ) -> AppResult<event_registration::Model> {
        model
            .insert(conn)
            .await
            .map_err(insert_error)
    }

    /// Flip a registration row from `from` to `to`.
    ///
    /// Returns whether the row was in `from` and changed.
    pub async fn update_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
        user_id: &str,
        from: RegistrationStatus,
        to: RegistrationStatus,
    ) -> AppResult<bool> {
        let result = EventRegistration::update_many()
            .col_expr(event_registration::Column::Status, Expr::value(to))
            .col_expr(
                event_registration::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(event_registration::Column::ContentId.eq(content_id))
            .filter(event_registration::Column::UserId.eq(user_id))
            .filter(event_registration::Column::Status.eq(from))
            .exec(conn)
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

    fn create_test_registration(status: RegistrationStatus) -> event_registration::Model {
        event_registration::Model {
            id: "reg1".to_string(),
            content_id: "c1".to_string(),
            user_id: "user1".to_string(),
            status,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_user() {
        let registration = create_test_registration(RegistrationStatus::Cancelled);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[registration.clone()]])
                .into_connection(),
        );

        let repo = RegistrationRepository::new(db);
        let found = repo.find_by_user("c1", "user1").await.unwrap();

        assert_eq!(found.map(|r| r.status), Some(RegistrationStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_count_active() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(2)),
                }]])
                .into_connection(),
        );

        let repo = RegistrationRepository::new(db);
        assert_eq!(repo.count_active_by_content("c1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = RegistrationRepository::new(Arc::clone(&db));
        let changed = repo
            .update_status(
                db.as_ref(),
                "c1",
                "user1",
                RegistrationStatus::Registered,
                RegistrationStatus::Cancelled,
            )
            .await
            .unwrap();

        assert!(!changed);
    }
}
