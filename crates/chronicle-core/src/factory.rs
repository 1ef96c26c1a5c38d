//! Aggregate factory — shell construction for rehydration.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::error::DomainError;

type ShellConstructor = Box<dyn Fn(Uuid) -> Box<dyn Any + Send> + Send + Sync>;

/// Registry of rehydration-shell constructors, keyed by aggregate type.
///
/// Replaying history requires an empty instance of the aggregate, but
/// construction is normally private to the domain module. Each module
/// registers its own (possibly private) constructor here at wiring time,
/// which keeps construction encapsulated from general domain code while
/// letting rehydration build the shell from outside the module.
#[derive(Default)]
pub struct AggregateFactory {
    constructors: HashMap<TypeId, ShellConstructor>,
}

impl AggregateFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers a shell constructor for aggregate type `A`, replacing any
    /// previous registration for the same type.
    pub fn register<A, F>(&mut self, constructor: F)
    where
        A: Send + 'static,
        F: Fn(Uuid) -> A + Send + Sync + 'static,
    {
        self.constructors.insert(
            TypeId::of::<A>(),
            Box::new(move |aggregate_id| Box::new(constructor(aggregate_id))),
        );
    }

    /// Produces a rehydration shell for aggregate type `A`.
    ///
    /// The returned instance carries no replayed state and is not valid
    /// domain state until history has been applied onto it by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Construction`] naming the aggregate type if
    /// no constructor is registered for `A`.
    pub fn create<A: 'static>(&self, aggregate_id: Uuid) -> Result<A, DomainError> {
        let constructor =
            self.constructors
                .get(&TypeId::of::<A>())
                .ok_or(DomainError::Construction {
                    aggregate_type: type_name::<A>(),
                })?;
        constructor(aggregate_id)
            .downcast::<A>()
            .map(|shell| *shell)
            .map_err(|_| DomainError::Construction {
                aggregate_type: type_name::<A>(),
            })
    }
}

impl fmt::Debug for AggregateFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateFactory")
            .field("registered", &self.constructors.len())
            .finish_non_exhaustive()
    }
}
