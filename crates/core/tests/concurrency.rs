//! Concurrent access against a real database.
//!
//! These tests require a running `PostgreSQL` instance (see the `TEST_DB_*`
//! variables in `agora_db::test_utils`).
//! Run with: `cargo test --test concurrency -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use agora_common::AppError;
use agora_core::{
    FundingService, LifecyclePolicies, LifecycleService, RecordFundingInput, RegistrationService,
};
use agora_db::entities::{
    content_item::{ContentStatus, ContentType},
    funding_transaction::FundingSource,
};
use agora_db::repositories::{
    ActivityRepository, ContentRepository, FundingRepository, PollRepository,
    RegistrationRepository,
};
use agora_db::test_utils::{TestDatabase, content_fixture};
use sea_orm::Set;
use tokio::task::JoinSet;

const CONTENDERS: usize = 8;

fn lifecycle(db: &TestDatabase) -> LifecycleService {
    LifecycleService::new(
        ContentRepository::new(db.shared()),
        PollRepository::new(db.shared()),
        ActivityRepository::new(db.shared()),
        LifecyclePolicies::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_registrations_never_exceed_capacity() {
    let db = TestDatabase::create()
        .await
        .expect("Failed to create test database");
    let mut event = content_fixture("e1", ContentType::Event, ContentStatus::Active);
    event.max_participants = Set(Some(3));
    db.seed_content(event).await.unwrap();

    let service = RegistrationService::new(
        ContentRepository::new(db.shared()),
        RegistrationRepository::new(db.shared()),
        lifecycle(&db),
    );
    service.register("e1", "early1").await.unwrap();
    service.register("e1", "early2").await.unwrap();

    // One seat left, many takers.
    let mut set = JoinSet::new();
    for n in 0..CONTENDERS {
        let service = service.clone();
        set.spawn(async move { service.register("e1", &format!("late{n}")).await });
    }

    let (mut admitted, mut full) = (0, 0);
    while let Some(joined) = set.join_next().await {
        match joined.unwrap() {
            Ok(state) => {
                assert!(state.changed);
                admitted += 1;
            }
            Err(AppError::EventFull { max_participants }) => {
                assert_eq!(max_participants, 3);
                full += 1;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(full, CONTENDERS - 1);
    assert_eq!(
        RegistrationRepository::new(db.shared())
            .count_active_by_content("e1")
            .await
            .unwrap(),
        3
    );

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_replays_apply_a_payment_once() {
    let db = TestDatabase::create()
        .await
        .expect("Failed to create test database");
    let mut need = content_fixture("n1", ContentType::Need, ContentStatus::Active);
    need.funding_goal = Set(Some(1000));
    db.seed_content(need).await.unwrap();

    let service = FundingService::new(
        ContentRepository::new(db.shared()),
        FundingRepository::new(db.shared()),
        lifecycle(&db),
    );

    let mut set = JoinSet::new();
    for _ in 0..CONTENDERS {
        let service = service.clone();
        set.spawn(async move {
            service
                .record_funding(RecordFundingInput {
                    content_id: "n1".to_string(),
                    amount: 400,
                    source_type: FundingSource::Donation,
                    dedupe_key: "tx1".to_string(),
                })
                .await
        });
    }

    let mut applied = 0;
    while let Some(joined) = set.join_next().await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.current_funding, 400);
        if result.applied {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);

    let summary = service.funding_summary("n1").await.unwrap();
    assert_eq!(summary.current_funding, 400);
    assert_eq!(summary.transaction_count, 1);
    assert_eq!(summary.progress, Some(0.4));

    let report = service.reconcile("n1").await.unwrap();
    assert_eq!(report.actual, 400);
    assert!(!report.repaired);

    db.drop_database().await.expect("Failed to drop database");
}
