//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_content_item_table;
mod m20260101_000002_create_poll_tables;
mod m20260101_000003_create_event_registration_table;
mod m20260101_000004_create_need_activity_table;
mod m20260101_000005_create_funding_transaction_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_content_item_table::Migration),
            Box::new(m20260101_000002_create_poll_tables::Migration),
            Box::new(m20260101_000003_create_event_registration_table::Migration),
            Box::new(m20260101_000004_create_need_activity_table::Migration),
            Box::new(m20260101_000005_create_funding_transaction_table::Migration),
        ]
    }
}
