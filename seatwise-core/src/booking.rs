use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ParseEnumError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    /// `PENDING -> {CONFIRMED, CANCELLED, EXPIRED}` and `CONFIRMED -> CANCELLED`.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Pending, BookingStatus::Expired)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        self != BookingStatus::Pending
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            other => Err(ParseEnumError {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

/// A customer's reservation of one or more seats for a single showtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seats: Vec<String>,
    /// Minor currency units.
    pub total_amount: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hold deadline; only set while `Pending`.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new_pending(
        id: Uuid,
        user_id: Uuid,
        showtime_id: Uuid,
        seats: Vec<String>,
        total_amount: i64,
        currency: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            showtime_id,
            seats,
            total_amount,
            currency,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: Some(expires_at),
        }
    }

    /// True when the booking is still pending and its hold deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Time left on the hold, zero once overdue.
    pub fn hold_remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.expires_at {
            Some(deadline) if deadline > now => deadline - now,
            _ => Duration::zero(),
        }
    }

    /// Overwrite the status; leaving `Pending` clears the deadline.
    pub fn set_status(&mut self, status: BookingStatus) {
        self.status = status;
        if status != BookingStatus::Pending {
            self.expires_at = None;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(expires_at: DateTime<Utc>) -> Booking {
        Booking::new_pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec!["A1".to_string()],
            200,
            "INR".to_string(),
            expires_at,
        )
    }

    #[test]
    fn test_state_machine_edges() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Expired));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Confirmed.can_transition_to(Expired));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Expired.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_overdue_and_deadline_clearing() {
        let now = Utc::now();
        let mut booking = pending(now - Duration::seconds(1));
        assert!(booking.is_overdue(now));
        assert_eq!(booking.hold_remaining(now), Duration::zero());

        booking.set_status(BookingStatus::Expired);
        assert!(booking.expires_at.is_none());
        assert!(!booking.is_overdue(now));

        let fresh = pending(now + Duration::minutes(15));
        assert!(!fresh.is_overdue(now));
        assert!(fresh.hold_remaining(now) > Duration::minutes(14));
    }
}
