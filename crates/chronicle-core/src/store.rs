//! Stored-event representation and the storage backend contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Stored representation of a domain event.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the aggregate stream.
    pub sequence_number: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl StoredEvent {
    /// Builds the stored representation of an in-memory domain event.
    #[must_use]
    pub fn from_event<E: DomainEvent>(event: &E) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            aggregate_id: meta.aggregate_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            sequence_number: meta.sequence_number,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        }
    }
}

/// One aggregate's slice of a unit-of-work commit: the events to append to
/// its stream and the version the stream is expected to be at.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// The aggregate whose stream is being appended to.
    pub aggregate_id: Uuid,
    /// The last sequence number already persisted for this aggregate.
    pub expected_version: i64,
    /// The events to append, in raise order.
    pub events: Vec<StoredEvent>,
}

/// Contract between the commit coordinator and a concrete storage engine.
///
/// Backends are responsible for durability only. The commit sequencing —
/// staging, finalization, dirty-set bookkeeping — lives in
/// [`crate::unit_of_work::DomainRepository`] and must never be
/// reimplemented here.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Loads all events for an aggregate, ordered by sequence number.
    /// Returns an empty vec for an unknown aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] if the read fails.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Durably persists every staged event of every aggregate in the
    /// batch. All-or-nothing: an error must leave every stream untouched.
    /// An empty batch is a trivial success.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Persistence`] if the write fails, or
    /// [`DomainError::ConcurrencyConflict`] if a stream has moved past an
    /// entry's expected version.
    async fn persist(&self, staged: &[CommitRequest]) -> Result<(), DomainError>;

    /// Discards any work staged for the current unit of work without
    /// touching aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] if the backend fails to discard its staged
    /// state.
    async fn rollback(&self) -> Result<(), DomainError>;

    /// Whether this backend can participate in a transaction spanning
    /// multiple coordinators. Informational; the coordinator never
    /// consults it.
    fn supports_distributed_transactions(&self) -> bool;
}
