//! Repository layer for database operations.

mod activity;
mod content;
mod funding;
mod poll;
mod registration;

pub use activity::ActivityRepository;
pub use content::ContentRepository;
pub use funding::FundingRepository;
pub use poll::PollRepository;
pub use registration::RegistrationRepository;

use agora_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map an insert failure, surfacing unique index violations as conflicts.
pub(crate) fn insert_error(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
        _ => AppError::StoreUnavailable(e.to_string()),
    }
}
