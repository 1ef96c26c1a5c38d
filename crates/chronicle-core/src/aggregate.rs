//! Aggregate root abstraction and the sealed finalization capability.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Capability token required to invoke [`AggregateRoot::commit_events`].
///
/// Only the commit coordinator can mint one — the constructor is private
/// to this crate — so finalization stays out of reach of ordinary domain
/// code even though the method itself is visible.
#[derive(Debug)]
pub struct CommitSeal {
    _private: (),
}

impl CommitSeal {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of persisted events).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state (used during
    /// reconstitution). Advances the version by one.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced since the last successful
    /// commit, in raise order.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Advances the version by the uncommitted-event count and clears the
    /// buffer, as a single step with no observable intermediate state.
    ///
    /// Invoked by the commit coordinator after a successful durable write;
    /// the coordinator verifies both post-conditions and treats a
    /// violation as a fatal inconsistency.
    fn commit_events(&mut self, seal: CommitSeal);
}
