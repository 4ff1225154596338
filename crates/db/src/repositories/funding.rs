//! Funding transaction repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QuerySelect, sea_query::Expr,
};

use crate::entities::{FundingTransaction, funding_transaction};
use super::insert_error;

#[derive(Debug, FromQueryResult)]
struct FundingTotal {
    total: i64,
}

/// Repository for the append-only funding ledger.
#[derive(Clone)]
pub struct FundingRepository {
    db: Arc<DatabaseConnection>,
}

impl FundingRepository {
    /// Create a new funding repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a transaction by its dedupe key.
    pub async fn find_by_dedupe_key<C: ConnectionTrait>(
        &self,
        conn: &C,
        dedupe_key: &str,
    ) -> AppResult<Option<funding_transaction::Model>> {
        FundingTransaction::find()
            .filter(funding_transaction::Column::DedupeKey.eq(dedupe_key))
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }

    /// Append a transaction.
    pub async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: funding_transaction::ActiveModel,
    ) -> AppResult<funding_transaction::Model> {
        model
            .insert(conn)
            .await
            .map_err(insert_error)
    }

    /// Sum of all transaction amounts for a content item.
    pub async fn sum_for_content<C: ConnectionTrait>(
        &self,
        conn: &C,
        content_id: &str,
    ) -> AppResult<i64> {
        let row = FundingTransaction::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(amount), 0)::BIGINT"), "total")
            .filter(funding_transaction::Column::ContentId.eq(content_id))
            .into_model::<FundingTotal>()
            .one(conn)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(row.map_or(0, |r| r.total))
    }

    /// Count transactions for a content item.
    pub async fn count_for_content(&self, content_id: &str) -> AppResult<u64> {
        FundingTransaction::find()
            .filter(funding_transaction::Column::ContentId.eq(content_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::funding_transaction::FundingSource;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_dedupe_key() {
        let tx = funding_transaction::Model {
            id: "f1".to_string(),
            content_id: "c1".to_string(),
            amount: 400,
            source_type: FundingSource::Donation,
            dedupe_key: "tx1".to_string(),
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[tx.clone()]])
                .into_connection(),
        );

        let repo = FundingRepository::new(Arc::clone(&db));
        let found = repo.find_by_dedupe_key(db.as_ref(), "tx1").await.unwrap();

        assert_eq!(found, Some(tx));
    }

    #[tokio::test]
    async fn test_sum_for_content() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "total" => sea_orm::Value::BigInt(Some(1_250)),
                }]])
                .into_connection(),
        );

        let repo = FundingRepository::new(Arc::clone(&db));
        let total = repo.sum_for_content(db.as_ref(), "c1").await.unwrap();

        assert_eq!(total, 1_250);
    }

    #[tokio::test]
    async fn test_count_for_content() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3)),
                }]])
                .into_connection(),
        );

        let repo = FundingRepository::new(db);
        assert_eq!(repo.count_for_content("c1").await.unwrap(), 3);
    }
}
