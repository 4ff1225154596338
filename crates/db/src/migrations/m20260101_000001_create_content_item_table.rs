//! Create `content_item` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentItem::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ContentItem::ContentType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentItem::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(ContentItem::Title).string_len(256).not_null())
                    .col(ColumnDef::new(ContentItem::Description).text())
                    .col(
                        ColumnDef::new(ContentItem::FundingGoal)
                            .big_integer()
                            .check(Expr::col(ContentItem::FundingGoal).gt(0)),
                    )
                    .col(
                        ColumnDef::new(ContentItem::CurrentFunding)
                            .big_integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(ContentItem::CurrentFunding).gte(0)),
                    )
                    .col(ColumnDef::new(ContentItem::VotingDeadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(ContentItem::EventDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ContentItem::MaxParticipants)
                            .integer()
                            .check(Expr::col(ContentItem::MaxParticipants).gt(0)),
                    )
                    .col(
                        ColumnDef::new(ContentItem::CompletionSignaledAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(ContentItem::CreatedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentItem::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ContentItem::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_item_status")
                    .table(ContentItem::Table)
                    .col(ContentItem::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_item_type_status")
                    .table(ContentItem::Table)
                    .col(ContentItem::ContentType)
                    .col(ContentItem::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_item_created_by")
                    .table(ContentItem::Table)
                    .col(ContentItem::CreatedBy)
                    .to_owned(),
            )
            .await?;

        // Lifecycle sweeper scans by deadline
        manager
            .create_index(
                Index::create()
                    .name("idx_content_item_voting_deadline")
                    .table(ContentItem::Table)
                    .col(ContentItem::VotingDeadline)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentItem::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ContentItem {
    Table,
    Id,
    ContentType,
    Status,
    Title,
    Description,
    FundingGoal,
    CurrentFunding,
    VotingDeadline,
    EventDate,
    MaxParticipants,
    CompletionSignaledAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
