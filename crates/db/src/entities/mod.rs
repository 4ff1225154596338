//! Database entities.

#![allow(missing_docs)]

pub mod content_item;
pub mod event_registration;
pub mod funding_transaction;
pub mod need_activity;
pub mod poll_option;
pub mod poll_vote;

pub use content_item::Entity as ContentItem;
pub use event_registration::Entity as EventRegistration;
pub use funding_transaction::Entity as FundingTransaction;
pub use need_activity::Entity as NeedActivity;
pub use poll_option::Entity as PollOption;
pub use poll_vote::Entity as PollVote;
