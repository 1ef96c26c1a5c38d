//! In-memory `StorageBackend` implementation.
//!
//! The reference backend used by integration tests and examples. Streams
//! live in a per-aggregate map behind a mutex; `persist` applies the whole
//! batch or none of it, with per-stream optimistic concurrency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use chronicle_core::error::DomainError;
use chronicle_core::store::{CommitRequest, StorageBackend, StoredEvent};

/// In-memory event store with per-stream optimistic concurrency.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    streams: Mutex<HashMap<Uuid, Vec<StoredEvent>>>,
    fail_persist: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arranges for the next `persist` call to fail with a persistence
    /// error, leaving every stream untouched. For failure-path tests.
    pub fn fail_next_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }

    /// Number of events currently stored for the given aggregate.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn stream_len(&self, aggregate_id: Uuid) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(&aggregate_id)
            .map_or(0, Vec::len)
    }

    fn locked_streams(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Vec<StoredEvent>>>, DomainError> {
        self.streams
            .lock()
            .map_err(|_| DomainError::Infrastructure("event store mutex poisoned".to_owned()))
    }
}

#[async_trait]
impl StorageBackend for InMemoryStore {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.locked_streams()?;
        let mut events = streams.get(&aggregate_id).cloned().unwrap_or_default();
        events.sort_by_key(|event| event.sequence_number);
        Ok(events)
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn persist(&self, staged: &[CommitRequest]) -> Result<(), DomainError> {
        if self.fail_persist.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Persistence(
                "simulated storage failure".to_owned(),
            ));
        }

        let mut streams = self.locked_streams()?;

        // Validate every entry before touching any stream, so a conflict
        // anywhere leaves the whole batch unapplied.
        for request in staged {
            let head = streams
                .get(&request.aggregate_id)
                .map_or(0, |stream| stream.len() as i64);
            if head != request.expected_version {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: request.aggregate_id,
                    expected: request.expected_version,
                    actual: head,
                });
            }
        }

        for request in staged {
            streams
                .entry(request.aggregate_id)
                .or_default()
                .extend(request.events.iter().cloned());
            debug!(
                aggregate_id = %request.aggregate_id,
                appended = request.events.len(),
                "appended events to stream"
            );
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        // Nothing is staged outside `persist`, so there is nothing to
        // discard.
        Ok(())
    }

    fn supports_distributed_transactions(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_stored_event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: "test.event".to_owned(),
            payload: serde_json::json!({"key": "value"}),
            sequence_number,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    fn request(aggregate_id: Uuid, expected_version: i64, events: Vec<StoredEvent>) -> CommitRequest {
        CommitRequest {
            aggregate_id,
            expected_version,
            events,
        }
    }

    #[tokio::test]
    async fn test_load_events_returns_empty_vec_for_unknown_aggregate() {
        let store = InMemoryStore::new();

        let events = store.load_events(Uuid::new_v4()).await.unwrap();

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip_preserves_order() {
        let store = InMemoryStore::new();
        let aggregate_id = Uuid::new_v4();
        let events = vec![
            make_stored_event(aggregate_id, 1),
            make_stored_event(aggregate_id, 2),
            make_stored_event(aggregate_id, 3),
        ];

        store
            .persist(&[request(aggregate_id, 0, events)])
            .await
            .unwrap();

        let loaded = store.load_events(aggregate_id).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].sequence_number, 1);
        assert_eq!(loaded[1].sequence_number, 2);
        assert_eq!(loaded[2].sequence_number, 3);
    }

    #[tokio::test]
    async fn test_persist_appends_across_units_of_work() {
        let store = InMemoryStore::new();
        let aggregate_id = Uuid::new_v4();

        store
            .persist(&[request(
                aggregate_id,
                0,
                vec![make_stored_event(aggregate_id, 1)],
            )])
            .await
            .unwrap();
        store
            .persist(&[request(
                aggregate_id,
                1,
                vec![make_stored_event(aggregate_id, 2)],
            )])
            .await
            .unwrap();

        assert_eq!(store.stream_len(aggregate_id), 2);
    }

    #[tokio::test]
    async fn test_persist_detects_stale_expected_version() {
        let store = InMemoryStore::new();
        let aggregate_id = Uuid::new_v4();
        store
            .persist(&[request(
                aggregate_id,
                0,
                vec![make_stored_event(aggregate_id, 1)],
            )])
            .await
            .unwrap();

        let err = store
            .persist(&[request(
                aggregate_id,
                0,
                vec![make_stored_event(aggregate_id, 1)],
            )])
            .await
            .unwrap_err();

        match err {
            DomainError::ConcurrencyConflict {
                aggregate_id: conflicted,
                expected,
                actual,
            } => {
                assert_eq!(conflicted, aggregate_id);
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conflict_anywhere_leaves_whole_batch_unapplied() {
        let store = InMemoryStore::new();
        let clean = Uuid::new_v4();
        let conflicted = Uuid::new_v4();
        store
            .persist(&[request(
                conflicted,
                0,
                vec![make_stored_event(conflicted, 1)],
            )])
            .await
            .unwrap();

        let err = store
            .persist(&[
                request(clean, 0, vec![make_stored_event(clean, 1)]),
                request(conflicted, 0, vec![make_stored_event(conflicted, 1)]),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));
        assert_eq!(store.stream_len(clean), 0);
        assert_eq!(store.stream_len(conflicted), 1);
    }

    #[tokio::test]
    async fn test_fail_next_persist_fails_once_then_recovers() {
        let store = InMemoryStore::new();
        let aggregate_id = Uuid::new_v4();
        let batch = [request(
            aggregate_id,
            0,
            vec![make_stored_event(aggregate_id, 1)],
        )];

        store.fail_next_persist();
        let err = store.persist(&batch).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
        assert_eq!(store.stream_len(aggregate_id), 0);

        store.persist(&batch).await.unwrap();
        assert_eq!(store.stream_len(aggregate_id), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_trivial_success() {
        let store = InMemoryStore::new();

        store.persist(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_is_a_no_op() {
        let store = InMemoryStore::new();
        let aggregate_id = Uuid::new_v4();
        store
            .persist(&[request(
                aggregate_id,
                0,
                vec![make_stored_event(aggregate_id, 1)],
            )])
            .await
            .unwrap();

        store.rollback().await.unwrap();

        assert_eq!(store.stream_len(aggregate_id), 1);
    }
}
