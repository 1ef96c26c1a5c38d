//! Shared test mocks and fixtures for Chronicle.

mod account;
mod backend;
mod clock;

pub use account::{
    ACCOUNT_OPENED_EVENT_TYPE, Account, AccountEvent, AccountEventKind, AccountOpened,
    FUNDS_DEPOSITED_EVENT_TYPE, FundsDeposited,
};
pub use backend::{FailingBackend, RecordingBackend};
pub use clock::FixedClock;
