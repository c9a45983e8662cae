use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// State of one seat label for one showtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Free,
    Held {
        booking_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    Confirmed {
        booking_id: Uuid,
    },
}

impl SeatState {
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            SeatState::Free => None,
            SeatState::Held { booking_id, .. } | SeatState::Confirmed { booking_id } => Some(*booking_id),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, SeatState::Free)
    }
}

/// Seats successfully placed on hold for a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeldSet {
    pub showtime_id: Uuid,
    pub booking_id: Uuid,
    pub seats: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// A hold found past its deadline while scanning the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredHold {
    pub showtime_id: Uuid,
    pub booking_id: Uuid,
    pub seats: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatSelectionError {
    #[error("At least one seat must be selected")]
    Empty,
    #[error("Seat labels must not be blank")]
    BlankLabel,
    #[error("Seat {0} selected more than once")]
    Duplicate(String),
}

/// Reject empty selections, blank labels and repeated labels.
pub fn validate_seat_selection(seats: &[String]) -> Result<(), SeatSelectionError> {
    if seats.is_empty() {
        return Err(SeatSelectionError::Empty);
    }

    let mut seen = HashSet::with_capacity(seats.len());
    for seat in seats {
        if seat.trim().is_empty() {
            return Err(SeatSelectionError::BlankLabel);
        }
        if !seen.insert(seat.as_str()) {
            return Err(SeatSelectionError::Duplicate(seat.clone()));
        }
    }

    Ok(())
}
