use seatwise_catalog::CatalogError;
use seatwise_core::seat::SeatSelectionError;
use seatwise_core::{BookingStatus, LedgerError, StoreError, TransactionStatus};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("At least one seat must be selected")]
    EmptySeatSelection,

    #[error("Invalid seat label: {0:?}")]
    InvalidSeatLabel(String),

    #[error("Seat {0} selected more than once")]
    DuplicateSeat(String),

    #[error("Seat {0} does not exist on this screen")]
    UnknownSeat(String),

    #[error("Showtime not found: {0}")]
    ShowtimeNotFound(Uuid),

    #[error("Showtime {0} is not open for booking")]
    ShowtimeInactive(Uuid),

    #[error("Seats already taken: {}", .0.join(", "))]
    SeatConflict(Vec<String>),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Booking {0} belongs to another user")]
    Forbidden(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<SeatSelectionError> for BookingError {
    fn from(err: SeatSelectionError) -> Self {
        match err {
            SeatSelectionError::Empty => BookingError::EmptySeatSelection,
            SeatSelectionError::BlankLabel => BookingError::InvalidSeatLabel(String::new()),
            SeatSelectionError::Duplicate(label) => BookingError::DuplicateSeat(label),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { seats } => BookingError::SeatConflict(seats),
            other => BookingError::Ledger(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Booking {booking_id} is {status}, payment requires PENDING")]
    InvalidBookingState {
        booking_id: Uuid,
        status: BookingStatus,
    },

    #[error("Hold on booking {0} has expired")]
    HoldExpired(Uuid),

    #[error("Booking {0} already has a payment in flight")]
    TransactionInFlight(Uuid),

    #[error("Transaction not found: {0}")]
    UnknownTransaction(Uuid),

    #[error("Transaction {transaction_id} is already {status}")]
    AlreadyFinalized {
        transaction_id: Uuid,
        status: TransactionStatus,
    },

    #[error("Reservation for booking {0} was lost before payment completed; payment marked for refund")]
    ReservationLost(Uuid),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
