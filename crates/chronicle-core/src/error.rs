//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    NotFound(Uuid),

    /// No shell constructor is registered for the aggregate type.
    #[error("no shell constructor registered for aggregate type {aggregate_type}")]
    Construction {
        /// Name of the aggregate type that could not be constructed.
        aggregate_type: &'static str,
    },

    /// The durable write failed. The dirty set is intact and the caller may
    /// retry the commit.
    #[error("durable write failed: {0}")]
    Persistence(String),

    /// Optimistic concurrency conflict at the storage layer.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Post-commit bookkeeping could not be applied after a successful
    /// durable write. Persisted and in-memory state have diverged; this is
    /// a fatal internal inconsistency, not a retryable failure.
    #[error("finalization invariant violated for aggregate {aggregate_id}: {detail}")]
    FinalizationInvariant {
        /// The aggregate whose bookkeeping diverged.
        aggregate_id: Uuid,
        /// Which post-condition failed.
        detail: String,
    },

    /// An infrastructure/plumbing error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
