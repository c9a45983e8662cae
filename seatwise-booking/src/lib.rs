pub mod compensation;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod reconciliation;
pub mod sweeper;

pub use compensation::RetryPolicy;
pub use error::{BookingError, PaymentError};
pub use ledger::InMemorySeatLedger;
pub use manager::{BookingRules, CancelOutcome, ReservationManager};
pub use reconciliation::PaymentReconciler;
pub use sweeper::{ExpirySweeper, SweepReport, DEFAULT_SWEEP_INTERVAL};
