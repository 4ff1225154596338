//! Fixtures shared by service tests.

use std::collections::BTreeMap;

use agora_db::entities::{
    content_item::{self, ContentStatus, ContentType},
    need_activity, poll_option,
};
use chrono::{Duration, Utc};
use sea_orm::{MockExecResult, Value, prelude::DateTimeWithTimeZone};

pub fn seconds_from_now(seconds: i64) -> DateTimeWithTimeZone {
    (Utc::now() + Duration::seconds(seconds)).into()
}

pub fn content(id: &str, content_type: ContentType, status: ContentStatus) -> content_item::Model {
    content_item::Model {
        id: id.to_string(),
        content_type,
        status,
        title: format!("Test {content_type}"),
        description: None,
        funding_goal: None,
        current_funding: 0,
        voting_deadline: None,
        event_date: None,
        max_participants: None,
        completion_signaled_at: None,
        created_by: "creator1".to_string(),
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn option(id: &str, content_id: &str, position: i32, votes: i32) -> poll_option::Model {
    poll_option::Model {
        id: id.to_string(),
        content_id: content_id.to_string(),
        text: format!("Option {position}"),
        position,
        vote_count: votes,
    }
}

pub fn activity(id: &str, content_id: &str, position: i32, done: bool) -> need_activity::Model {
    need_activity::Model {
        id: id.to_string(),
        content_id: content_id.to_string(),
        title: format!("Step {position}"),
        position,
        is_completed: done,
        completed_by: done.then(|| "helper1".to_string()),
        completed_at: done.then(|| seconds_from_now(-60)),
    }
}

pub const fn exec_ok(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

pub fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
    maplit::btreemap! {
        "num_items" => Value::BigInt(Some(n)),
    }
}
