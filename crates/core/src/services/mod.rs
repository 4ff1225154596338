//! Business logic services.

#![allow(missing_docs)]

pub mod activity;
pub mod content;
pub mod event_publisher;
pub mod funding;
pub mod lifecycle;
pub mod poll;
pub mod registration;

#[cfg(test)]
mod test_support;

pub use activity::{ActivityService, ActivityUpdate, Checklist, ChecklistProgress};
pub use content::{
    ContentDetails, ContentListFilter, ContentService, ContentView, CreateContentInput,
    FundingView, NewContentKind,
};
pub use event_publisher::{
    ChangeKind, ContentChanged, EventPublisher, EventPublisherService, NoOpEventPublisher,
};
pub use funding::{
    FundingResult, FundingService, FundingSummary, ReconcileReport, RecordFundingInput,
};
pub use lifecycle::{
    AlwaysApprove, ApprovalPolicy, ClearWinner, CompletionPolicy, CompletionSignal,
    LifecyclePolicies, LifecycleService, LifecycleSnapshot, MinimumVotes, StandardCompletion,
    StatusChange, SweepReport,
};
pub use poll::{OptionTally, PollResults, PollService, VoteResult};
pub use registration::{RegistrationService, RegistrationState};
