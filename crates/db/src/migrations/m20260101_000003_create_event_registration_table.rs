//! Create `event_registration` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventRegistration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventRegistration::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EventRegistration::ContentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistration::UserId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventRegistration::Status)
                            .string_len(16)
                            .not_null()
                            .default("registered"),
                    )
                    .col(
                        ColumnDef::new(EventRegistration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(EventRegistration::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_event_registration_content")
                            .from(EventRegistration::Table, EventRegistration::ContentId)
                            .to(ContentItem::Table, ContentItem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint on (content_id, user_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_event_registration_content_user")
                    .table(EventRegistration::Table)
                    .col(EventRegistration::ContentId)
                    .col(EventRegistration::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Active-count queries filter by (content_id, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_event_registration_content_status")
                    .table(EventRegistration::Table)
                    .col(EventRegistration::ContentId)
                    .col(EventRegistration::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventRegistration::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EventRegistration {
    Table,
    Id,
    ContentId,
    UserId,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ContentItem {
    Table,
    Id,
}
