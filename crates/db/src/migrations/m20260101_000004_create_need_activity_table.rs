//! Create `need_activity` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NeedActivity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NeedActivity::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NeedActivity::ContentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(NeedActivity::Title).string_len(256).not_null())
                    .col(ColumnDef::new(NeedActivity::Position).integer().not_null())
                    .col(
                        ColumnDef::new(NeedActivity::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(NeedActivity::CompletedBy).string_len(64))
                    .col(ColumnDef::new(NeedActivity::CompletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_need_activity_content")
                            .from(NeedActivity::Table, NeedActivity::ContentId)
                            .to(ContentItem::Table, ContentItem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_need_activity_content_id")
                    .table(NeedActivity::Table)
                    .col(NeedActivity::ContentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NeedActivity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum NeedActivity {
    Table,
    Id,
    ContentId,
    Title,
    Position,
    IsCompleted,
    CompletedBy,
    CompletedAt,
}

#[derive(Iden)]
enum ContentItem {
    Table,
    Id,
}
