//! Create `poll_option` and `poll_vote` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PollOption::ContentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollOption::Text).string_len(256).not_null())
                    .col(ColumnDef::new(PollOption::Position).integer().not_null())
                    .col(
                        ColumnDef::new(PollOption::VoteCount)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(PollOption::VoteCount).gte(0)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_option_content")
                            .from(PollOption::Table, PollOption::ContentId)
                            .to(ContentItem::Table, ContentItem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_content_id")
                    .table(PollOption::Table)
                    .col(PollOption::ContentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollVote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollVote::ContentId).string_len(32).not_null())
                    .col(ColumnDef::new(PollVote::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(PollVote::OptionId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PollVote::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_content")
                            .from(PollVote::Table, PollVote::ContentId)
                            .to(ContentItem::Table, ContentItem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_option")
                            .from(PollVote::Table, PollVote::OptionId)
                            .to(PollOption::Table, PollOption::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One vote per user per poll
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_content_user")
                    .table(PollVote::Table)
                    .col(PollVote::ContentId)
                    .col(PollVote::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_option_id")
                    .table(PollVote::Table)
                    .col(PollVote::OptionId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollVote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollOption::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
    ContentId,
    Text,
    Position,
    VoteCount,
}

#[derive(Iden)]
enum PollVote {
    Table,
    Id,
    ContentId,
    UserId,
    OptionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ContentItem {
    Table,
    Id,
}
