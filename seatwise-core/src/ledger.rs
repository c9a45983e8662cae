use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::seat::{ExpiredHold, HeldSet, SeatState};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Seats unavailable: {}", seats.join(", "))]
    Conflict { seats: Vec<String> },

    #[error("Booking {booking_id} holds no seats for showtime {showtime_id}")]
    NotHeld { showtime_id: Uuid, booking_id: Uuid },

    #[error("Seat ledger backend error: {0}")]
    Backend(String),
}

/// Authoritative per-showtime seat state.
///
/// Every mutation is scoped to one showtime. `acquire_seats` is all-or-nothing
/// and linearizable per showtime; `confirm_seats` and `release_seats` only ever
/// touch seats owned by the given booking.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// FREE -> HELD for every label, or nothing at all.
    async fn acquire_seats(
        &self,
        showtime_id: Uuid,
        seats: &[String],
        booking_id: Uuid,
        hold: Duration,
    ) -> Result<HeldSet, LedgerError>;

    /// HELD -> CONFIRMED for every seat held by the booking.
    async fn confirm_seats(&self, showtime_id: Uuid, booking_id: Uuid) -> Result<(), LedgerError>;

    /// HELD/CONFIRMED -> FREE for every seat owned by the booking. Idempotent.
    async fn release_seats(&self, showtime_id: Uuid, booking_id: Uuid) -> Result<(), LedgerError>;

    /// Non-free seats of a showtime keyed by label.
    async fn seat_map(&self, showtime_id: Uuid) -> Result<BTreeMap<String, SeatState>, LedgerError>;

    /// Holds whose deadline is at or before `now`, grouped per booking.
    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredHold>, LedgerError>;

    /// Mark a showtime as possibly carrying orphaned holds.
    async fn flag_for_reconciliation(&self, showtime_id: Uuid) -> Result<(), LedgerError>;

    /// Drain the set of flagged showtimes.
    async fn take_flagged(&self) -> Result<Vec<Uuid>, LedgerError>;
}
