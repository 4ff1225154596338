//! Create `funding_transaction` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FundingTransaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FundingTransaction::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FundingTransaction::ContentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FundingTransaction::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(FundingTransaction::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(FundingTransaction::SourceType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FundingTransaction::DedupeKey)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FundingTransaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_funding_transaction_content")
                            .from(FundingTransaction::Table, FundingTransaction::ContentId)
                            .to(ContentItem::Table, ContentItem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_funding_transaction_dedupe_key")
                    .table(FundingTransaction::Table)
                    .col(FundingTransaction::DedupeKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_funding_transaction_content_id")
                    .table(FundingTransaction::Table)
                    .col(FundingTransaction::ContentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FundingTransaction::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FundingTransaction {
    Table,
    Id,
    ContentId,
    Amount,
    SourceType,
    DedupeKey,
    CreatedAt,
}

#[derive(Iden)]
enum ContentItem {
    Table,
    Id,
}
