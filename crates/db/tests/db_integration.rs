//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `agora_test`)
//!   `TEST_DB_PASSWORD` (default: `agora_test`)
//!   `TEST_DB_NAME` (default: `agora_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use agora_common::AppError;
use agora_db::entities::{
    content_item::{ContentStatus, ContentType},
    event_registration::{self, RegistrationStatus},
    funding_transaction::{self, FundingSource},
    poll_option, poll_vote,
};
use agora_db::repositories::{
    ContentRepository, FundingRepository, PollRepository, RegistrationRepository,
};
use agora_db::test_utils::{TestDatabase, TestDbConfig, content_fixture};
use chrono::Utc;
use sea_orm::Set;

async fn seeded(id: &str, content_type: ContentType, status: ContentStatus) -> TestDatabase {
    let db = TestDatabase::create()
        .await
        .expect("Failed to create test database");
    let mut model = content_fixture(id, content_type, status);
    model.funding_goal = Set(Some(1000));
    model.max_participants = Set(Some(2));
    db.seed_content(model).await.expect("Failed to seed content");
    db
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::connect(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_apply_cleanly() {
    let db = TestDatabase::create()
        .await
        .expect("Failed to create test database");
    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_conditional_status_update() {
    let db = seeded("c1", ContentType::Challenge, ContentStatus::Voting).await;
    let repo = ContentRepository::new(db.shared());

    let moved = repo
        .update_status(repo.db(), "c1", ContentStatus::Voting, ContentStatus::Approved)
        .await
        .unwrap();
    let stale = repo
        .update_status(repo.db(), "c1", ContentStatus::Voting, ContentStatus::Approved)
        .await
        .unwrap();

    assert!(moved);
    assert!(!stale);
    assert_eq!(
        repo.get_by_id("c1").await.unwrap().status,
        ContentStatus::Approved
    );

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_one_vote_per_user_per_poll() {
    let db = seeded("p1", ContentType::Poll, ContentStatus::Voting).await;
    let content_repo = ContentRepository::new(db.shared());
    let poll_repo = PollRepository::new(db.shared());

    poll_repo
        .insert_options(
            content_repo.db(),
            ["a", "b"]
                .iter()
                .enumerate()
                .map(|(position, id)| poll_option::ActiveModel {
                    id: Set((*id).to_string()),
                    content_id: Set("p1".to_string()),
                    text: Set(id.to_uppercase()),
                    position: Set(position as i32),
                    vote_count: Set(0),
                })
                .collect(),
        )
        .await
        .unwrap();

    let vote = |id: &str, option_id: &str| poll_vote::ActiveModel {
        id: Set(id.to_string()),
        content_id: Set("p1".to_string()),
        user_id: Set("user1".to_string()),
        option_id: Set(option_id.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    poll_repo
        .insert_vote(content_repo.db(), vote("v1", "a"))
        .await
        .unwrap();
    let duplicate = poll_repo.insert_vote(content_repo.db(), vote("v2", "b")).await;

    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert_eq!(poll_repo.count_voters("p1").await.unwrap(), 1);

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_one_registration_row_per_user() {
    let db = seeded("e1", ContentType::Event, ContentStatus::Active).await;
    let content_repo = ContentRepository::new(db.shared());
    let registration_repo = RegistrationRepository::new(db.shared());

    let registration = |id: &str| event_registration::ActiveModel {
        id: Set(id.to_string()),
        content_id: Set("e1".to_string()),
        user_id: Set("user1".to_string()),
        status: Set(RegistrationStatus::Registered),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    registration_repo
        .insert(content_repo.db(), registration("r1"))
        .await
        .unwrap();
    let duplicate = registration_repo
        .insert(content_repo.db(), registration("r2"))
        .await;

    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert_eq!(
        registration_repo.count_active_by_content("e1").await.unwrap(),
        1
    );

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_dedupe_key_is_unique_and_sum_matches_ledger() {
    let db = seeded("n1", ContentType::Need, ContentStatus::Active).await;
    let content_repo = ContentRepository::new(db.shared());
    let funding_repo = FundingRepository::new(db.shared());

    let transaction = |id: &str, amount: i64, key: &str| funding_transaction::ActiveModel {
        id: Set(id.to_string()),
        content_id: Set("n1".to_string()),
        amount: Set(amount),
        source_type: Set(FundingSource::Donation),
        dedupe_key: Set(key.to_string()),
        created_at: Set(Utc::now().into()),
    };

    funding_repo
        .insert(content_repo.db(), transaction("f1", 400, "tx1"))
        .await
        .unwrap();
    funding_repo
        .insert(content_repo.db(), transaction("f2", 250, "tx2"))
        .await
        .unwrap();
    let replay = funding_repo
        .insert(content_repo.db(), transaction("f3", 400, "tx1"))
        .await;

    assert!(matches!(replay, Err(AppError::Conflict(_))));
    assert_eq!(
        funding_repo
            .sum_for_content(content_repo.db(), "n1")
            .await
            .unwrap(),
        650
    );

    db.drop_database().await.expect("Failed to drop database");
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
