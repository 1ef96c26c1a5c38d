//! Scripted `StorageBackend` doubles for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::store::{CommitRequest, StorageBackend, StoredEvent};
use uuid::Uuid;

/// A backend that records every persisted batch. Returns the configured
/// event list from `load_events` on every call and always succeeds on
/// `persist` and `rollback`.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    load_result: Mutex<Vec<StoredEvent>>,
    persisted: Mutex<Vec<Vec<CommitRequest>>>,
}

impl RecordingBackend {
    /// Creates a backend that will return `load_result` from every
    /// `load_events` call.
    #[must_use]
    pub fn new(load_result: Vec<StoredEvent>) -> Self {
        Self {
            load_result: Mutex::new(load_result),
            persisted: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of every batch passed to `persist`, in call
    /// order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn persisted_batches(&self) -> Vec<Vec<CommitRequest>> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.lock().unwrap().clone())
    }

    async fn persist(&self, staged: &[CommitRequest]) -> Result<(), DomainError> {
        self.persisted.lock().unwrap().push(staged.to_vec());
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn supports_distributed_transactions(&self) -> bool {
        false
    }
}

/// A backend that always returns an infrastructure error. Useful for
/// error-handling paths.
#[derive(Debug)]
pub struct FailingBackend;

#[async_trait]
impl StorageBackend for FailingBackend {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn persist(&self, _staged: &[CommitRequest]) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    fn supports_distributed_transactions(&self) -> bool {
        false
    }
}
