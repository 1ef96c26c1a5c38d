//! Tests for the shared fixtures themselves.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::factory::AggregateFactory;
use chronicle_core::store::StoredEvent;
use chronicle_core::unit_of_work::DomainRepository;
use chronicle_test_support::{
    ACCOUNT_OPENED_EVENT_TYPE, Account, FUNDS_DEPOSITED_EVENT_TYPE, FailingBackend, FixedClock,
    RecordingBackend,
};

fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
}

fn account_factory() -> AggregateFactory {
    let mut factory = AggregateFactory::new();
    Account::register_shell(&mut factory);
    factory
}

#[tokio::test]
async fn test_recording_backend_captures_the_persisted_batch() {
    let backend = Arc::new(RecordingBackend::default());
    let mut repo = DomainRepository::new(Arc::clone(&backend), account_factory());
    let clock = fixed_clock();

    let account_id = Uuid::new_v4();
    let account = Arc::new(Mutex::new(Account::open(
        account_id,
        "Ada",
        Uuid::new_v4(),
        &clock,
    )));
    account.lock().unwrap().deposit(500, Uuid::new_v4(), &clock);

    repo.save(&account).unwrap();
    repo.commit().await.unwrap();

    let batches = backend.persisted_batches();
    assert_eq!(batches.len(), 1);
    let request = &batches[0][0];
    assert_eq!(request.aggregate_id, account_id);
    assert_eq!(request.expected_version, 0);
    assert_eq!(request.events.len(), 2);
    assert_eq!(request.events[0].event_type, ACCOUNT_OPENED_EVENT_TYPE);
    assert_eq!(request.events[1].event_type, FUNDS_DEPOSITED_EVENT_TYPE);
    assert_eq!(request.events[0].occurred_at, clock.0);
}

#[tokio::test]
async fn test_failing_backend_fails_the_commit_and_stages_nothing_away() {
    let backend = Arc::new(FailingBackend);
    let mut repo = DomainRepository::new(Arc::clone(&backend), account_factory());

    let account = Arc::new(Mutex::new(Account::open(
        Uuid::new_v4(),
        "Ada",
        Uuid::new_v4(),
        &fixed_clock(),
    )));
    repo.save(&account).unwrap();

    let err = repo.commit().await.unwrap_err();

    assert!(matches!(err, DomainError::Infrastructure(_)));
    assert_eq!(account.lock().unwrap().version(), 0);
    assert_eq!(account.lock().unwrap().uncommitted_events().len(), 1);
    assert!(!repo.is_committed());
    assert_eq!(repo.staged_count(), 1);
}

#[tokio::test]
async fn test_factory_shell_plus_replay_reproduces_recorded_history() {
    let clock = fixed_clock();
    let account_id = Uuid::new_v4();

    // Record a history by raising events on a fresh aggregate.
    let mut recorded = Account::open(account_id, "Ada", Uuid::new_v4(), &clock);
    recorded.deposit(1_000, Uuid::new_v4(), &clock);
    recorded.deposit(250, Uuid::new_v4(), &clock);
    let history: Vec<StoredEvent> = recorded
        .uncommitted_events()
        .iter()
        .map(StoredEvent::from_event)
        .collect();

    let backend = Arc::new(RecordingBackend::new(history.clone()));
    let repo = DomainRepository::new(Arc::clone(&backend), account_factory());

    let rehydrated: Account = repo.get(account_id).await.unwrap();

    assert_eq!(rehydrated.version(), i64::try_from(history.len()).unwrap());
    assert_eq!(rehydrated.owner(), Some("Ada"));
    assert_eq!(rehydrated.balance_cents(), 1_250);
    assert!(rehydrated.uncommitted_events().is_empty());
}
