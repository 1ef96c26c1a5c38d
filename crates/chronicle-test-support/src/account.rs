//! Sample event-sourced domain used by integration tests.

use chronicle_core::aggregate::{AggregateRoot, CommitSeal};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::{DomainEvent, EventMetadata};
use chronicle_core::factory::AggregateFactory;
use chronicle_core::store::StoredEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when an account is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOpened {
    /// The account identifier.
    pub account_id: Uuid,
    /// Display name of the account owner.
    pub owner: String,
}

/// Emitted when funds are deposited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsDeposited {
    /// The account identifier.
    pub account_id: Uuid,
    /// Deposited amount in cents.
    pub amount_cents: i64,
}

/// Event type identifier for [`AccountOpened`].
pub const ACCOUNT_OPENED_EVENT_TYPE: &str = "account.opened";

/// Event type identifier for [`FundsDeposited`].
pub const FUNDS_DEPOSITED_EVENT_TYPE: &str = "account.funds_deposited";

/// Event payload variants for the sample account domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountEventKind {
    /// An account has been opened.
    Opened(AccountOpened),
    /// Funds have been deposited.
    Deposited(FundsDeposited),
}

/// Domain event envelope for the sample account domain.
#[derive(Debug, Clone)]
pub struct AccountEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AccountEventKind,
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            AccountEventKind::Opened(_) => ACCOUNT_OPENED_EVENT_TYPE,
            AccountEventKind::Deposited(_) => FUNDS_DEPOSITED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("AccountEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!("event deserialization failed: {e}"))
        })?;
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            kind,
        })
    }
}

/// The aggregate root for a sample account.
#[derive(Debug)]
pub struct Account {
    /// Aggregate identifier.
    pub id: Uuid,
    version: i64,
    owner: Option<String>,
    balance_cents: i64,
    uncommitted_events: Vec<AccountEvent>,
}

impl Account {
    /// Opens a new account, raising an [`AccountOpened`] event.
    #[must_use]
    pub fn open(id: Uuid, owner: &str, correlation_id: Uuid, clock: &dyn Clock) -> Self {
        let mut account = Self::shell(id);
        let event = account.envelope(
            ACCOUNT_OPENED_EVENT_TYPE,
            AccountEventKind::Opened(AccountOpened {
                account_id: id,
                owner: owner.to_owned(),
            }),
            correlation_id,
            clock,
        );
        account.uncommitted_events.push(event);
        account
    }

    /// Deposits funds, raising a [`FundsDeposited`] event.
    pub fn deposit(&mut self, amount_cents: i64, correlation_id: Uuid, clock: &dyn Clock) {
        let event = self.envelope(
            FUNDS_DEPOSITED_EVENT_TYPE,
            AccountEventKind::Deposited(FundsDeposited {
                account_id: self.id,
                amount_cents,
            }),
            correlation_id,
            clock,
        );
        self.uncommitted_events.push(event);
    }

    /// Current balance in cents (only reflects applied events).
    #[must_use]
    pub fn balance_cents(&self) -> i64 {
        self.balance_cents
    }

    /// Owner name, if an opened event has been applied.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Registers this aggregate's shell constructor so rehydration can
    /// build instances without the constructor being public.
    pub fn register_shell(factory: &mut AggregateFactory) {
        factory.register(Self::shell);
    }

    fn shell(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            owner: None,
            balance_cents: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn envelope(
        &self,
        event_type: &str,
        kind: AccountEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> AccountEvent {
        AccountEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: event_type.to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        }
    }
}

impl AggregateRoot for Account {
    type Event = AccountEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            AccountEventKind::Opened(payload) => {
                self.owner = Some(payload.owner.clone());
            }
            AccountEventKind::Deposited(payload) => {
                self.balance_cents += payload.amount_cents;
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    #[allow(clippy::cast_possible_wrap)]
    fn commit_events(&mut self, _seal: CommitSeal) {
        self.version += self.uncommitted_events.len() as i64;
        self.uncommitted_events.clear();
    }
}
