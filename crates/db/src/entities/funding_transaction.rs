//! Funding transaction entity. Append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a funding amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum FundingSource {
    #[sea_orm(string_value = "donation")]
    Donation,
    #[sea_orm(string_value = "sponsorship")]
    Sponsorship,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "funding_transaction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub content_id: String,

    /// Amount in minor currency units (always positive)
    pub amount: i64,

    pub source_type: FundingSource,

    /// Idempotency token supplied by the payment collaborator
    #[sea_orm(unique)]
    pub dedupe_key: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content_item::Entity",
        from = "Column::ContentId",
        to = "super::content_item::Column::Id",
        on_delete = "Cascade"
    )]
    ContentItem,
}

impl Related<super::content_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
