use uuid::Uuid;

/// What happened to a booking.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    Created,
    Confirmed,
    Cancelled,
    Expired,
    Refunded,
}

impl BookingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventKind::Created => "booking_created",
            BookingEventKind::Confirmed => "booking_confirmed",
            BookingEventKind::Cancelled => "booking_cancelled",
            BookingEventKind::Expired => "booking_expired",
            BookingEventKind::Refunded => "booking_refunded",
        }
    }
}

/// Published on every booking status change. `seats` are the labels whose
/// ledger state changed alongside the booking.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: Uuid,
    pub showtime_id: Uuid,
    pub user_id: Uuid,
    pub seats: Vec<String>,
    pub timestamp: i64,
}

impl BookingEvent {
    pub fn new(
        kind: BookingEventKind,
        booking_id: Uuid,
        showtime_id: Uuid,
        user_id: Uuid,
        seats: Vec<String>,
    ) -> Self {
        Self {
            kind,
            booking_id,
            showtime_id,
            user_id,
            seats,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
