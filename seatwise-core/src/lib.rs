pub mod booking;
pub mod events;
pub mod ledger;
pub mod payment;
pub mod repository;
pub mod seat;

pub use booking::{Booking, BookingStatus};
pub use events::EventPublisher;
pub use ledger::{LedgerError, SeatLedger};
pub use payment::{PaymentMethod, PaymentOutcome, Transaction, TransactionStatus};
pub use repository::{BookingRepository, TransactionRepository};
pub use seat::{ExpiredHold, HeldSet, SeatState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
