//! Dirty set and the unit-of-work commit coordinator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, CommitSeal};
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::factory::AggregateFactory;
use crate::store::{CommitRequest, StorageBackend, StoredEvent};

/// Object-safe view of a staged aggregate, erased over its event type, so
/// one dirty set can hold aggregates of different types.
trait StagedAggregate: Send {
    fn identity(&self) -> Uuid;
    fn current_version(&self) -> i64;
    fn staged_events(&self) -> Vec<StoredEvent>;
    fn staged_len(&self) -> usize;
    fn finalize(&mut self, seal: CommitSeal);
}

impl<A: AggregateRoot> StagedAggregate for A {
    fn identity(&self) -> Uuid {
        self.aggregate_id()
    }

    fn current_version(&self) -> i64 {
        self.version()
    }

    fn staged_events(&self) -> Vec<StoredEvent> {
        self.uncommitted_events()
            .iter()
            .map(StoredEvent::from_event)
            .collect()
    }

    fn staged_len(&self) -> usize {
        self.uncommitted_events().len()
    }

    fn finalize(&mut self, seal: CommitSeal) {
        self.commit_events(seal);
    }
}

fn poisoned_lock() -> DomainError {
    DomainError::Infrastructure("aggregate mutex poisoned".to_owned())
}

/// Unit-of-work repository over a pluggable storage backend.
///
/// Aggregates are staged with [`save`](Self::save) and written in one
/// durable batch by [`commit`](Self::commit); only after the write
/// succeeds does the coordinator advance each aggregate's version and
/// clear its uncommitted-event buffer. The backend implements durability
/// only and never the sequencing.
///
/// One instance owns one logical unit of work. It is not safe for
/// concurrent use by multiple threads of control without external
/// synchronization: `save` mutates the dirty set and committed flag under
/// `&mut self`, and `commit` is not reentrant.
pub struct DomainRepository<B: StorageBackend> {
    backend: Arc<B>,
    factory: AggregateFactory,
    dirty: HashMap<Uuid, Arc<Mutex<dyn StagedAggregate>>>,
    committed: bool,
}

impl<B: StorageBackend> DomainRepository<B> {
    /// Creates a repository over `backend` with the given constructor
    /// registry.
    #[must_use]
    pub fn new(backend: Arc<B>, factory: AggregateFactory) -> Self {
        Self {
            backend,
            factory,
            dirty: HashMap::new(),
            committed: false,
        }
    }

    /// Returns the aggregate with the given identity, rehydrated from
    /// persisted history: a factory shell with every stored event replayed
    /// onto it in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the aggregate has no persisted
    /// events, [`DomainError::Construction`] if no shell constructor is
    /// registered for `A`, or any error from the backend read or event
    /// deserialization.
    pub async fn get<A>(&self, aggregate_id: Uuid) -> Result<A, DomainError>
    where
        A: AggregateRoot + 'static,
    {
        let stored = self.backend.load_events(aggregate_id).await?;
        if stored.is_empty() {
            return Err(DomainError::NotFound(aggregate_id));
        }

        let mut aggregate = self.factory.create::<A>(aggregate_id)?;
        for record in &stored {
            let event = A::Event::from_stored(record)?;
            aggregate.apply(&event);
        }
        Ok(aggregate)
    }

    /// Registers the aggregate in the dirty set if not already present and
    /// resets the committed flag. Registration is keyed by aggregate
    /// identity, so saving the same aggregate twice is a no-op. No I/O
    /// happens here; this only stages intent for the next
    /// [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Infrastructure`] if the aggregate's lock is
    /// poisoned.
    pub fn save<A>(&mut self, aggregate: &Arc<Mutex<A>>) -> Result<(), DomainError>
    where
        A: AggregateRoot + 'static,
    {
        self.committed = false;
        let aggregate_id = aggregate.lock().map_err(|_| poisoned_lock())?.aggregate_id();
        let erased: Arc<Mutex<dyn StagedAggregate>> = aggregate.clone();
        self.dirty.entry(aggregate_id).or_insert(erased);
        Ok(())
    }

    /// Commits the current unit of work.
    ///
    /// Asks the backend to durably persist every staged aggregate's
    /// uncommitted events as one all-or-nothing batch. Only if that
    /// succeeds does the coordinator finalize each aggregate — advance its
    /// version by the persisted-event count and clear its buffer, under
    /// the aggregate's lock so no observer sees a half-applied state —
    /// then drain the dirty set and raise the committed flag.
    ///
    /// # Errors
    ///
    /// If the durable write fails, the dirty set and every aggregate
    /// buffer are left untouched, the committed flag stays false, and the
    /// backend error propagates; the caller may resolve the cause and call
    /// `commit` again. A [`DomainError::FinalizationInvariant`] after a
    /// successful write means persisted and in-memory state have diverged
    /// and must be treated as fatal.
    #[instrument(skip(self), fields(staged = self.dirty.len()))]
    #[allow(clippy::cast_possible_wrap)]
    pub async fn commit(&mut self) -> Result<(), DomainError> {
        let mut staged = Vec::with_capacity(self.dirty.len());
        for entry in self.dirty.values() {
            let guard = entry.lock().map_err(|_| poisoned_lock())?;
            staged.push(CommitRequest {
                aggregate_id: guard.identity(),
                expected_version: guard.current_version(),
                events: guard.staged_events(),
            });
        }

        debug!(aggregates = staged.len(), "persisting unit of work");
        self.backend.persist(&staged).await?;

        for (aggregate_id, entry) in &self.dirty {
            let mut guard = entry.lock().map_err(|_| DomainError::FinalizationInvariant {
                aggregate_id: *aggregate_id,
                detail: "aggregate mutex poisoned after durable write".to_owned(),
            })?;
            let version_before = guard.current_version();
            let persisted = guard.staged_len() as i64;
            guard.finalize(CommitSeal::new());

            if guard.current_version() != version_before + persisted {
                return Err(DomainError::FinalizationInvariant {
                    aggregate_id: *aggregate_id,
                    detail: format!(
                        "version did not advance by {persisted} (was {version_before}, now {})",
                        guard.current_version()
                    ),
                });
            }
            if guard.staged_len() != 0 {
                return Err(DomainError::FinalizationInvariant {
                    aggregate_id: *aggregate_id,
                    detail: "uncommitted-event buffer not cleared".to_owned(),
                });
            }
        }

        self.dirty.clear();
        self.committed = true;
        debug!("unit of work committed");
        Ok(())
    }

    /// Discards the outstanding unit of work via the backend without
    /// finalizing any aggregate bookkeeping. The dirty set is deliberately
    /// left as-is; a fresh unit of work should start from a fresh
    /// coordinator.
    ///
    /// # Errors
    ///
    /// Returns any error from the backend's rollback.
    pub async fn rollback(&mut self) -> Result<(), DomainError> {
        self.backend.rollback().await
    }

    /// Whether the most recent unit of work finished cleanly. Reset by
    /// every [`save`](Self::save); the only state a caller should trust to
    /// know if reattempting is needed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Number of aggregates currently staged for commit.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.dirty.len()
    }

    /// Whether the backend can participate in a transaction spanning
    /// multiple coordinators. Forwarded from the backend, never consulted
    /// internally.
    #[must_use]
    pub fn distributed_transactions_supported(&self) -> bool {
        self.backend.supports_distributed_transactions()
    }
}
