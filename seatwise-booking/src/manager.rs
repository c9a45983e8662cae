use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use seatwise_catalog::{CatalogService, PricingEngine};
use seatwise_core::seat::validate_seat_selection;
use seatwise_core::{
    Booking, BookingRepository, BookingStatus, EventPublisher, SeatLedger, SeatState,
    TransactionRepository, TransactionStatus,
};
use seatwise_shared::models::events::{BookingEvent, BookingEventKind};

use crate::compensation::{release_or_flag, RetryPolicy};
use crate::error::BookingError;

/// Tunables for the reservation lifecycle
#[derive(Debug, Clone)]
pub struct BookingRules {
    /// How long unpaid seats stay held
    pub hold_duration: Duration,
    pub currency: String,
    pub release_retry: RetryPolicy,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(15),
            currency: "INR".to_string(),
            release_retry: RetryPolicy::default(),
        }
    }
}

/// Result of a cancellation request. Repeating a cancellation is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
    AlreadyExpired,
}

impl CancelOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "Booking cancelled successfully",
            CancelOutcome::AlreadyCancelled => "Booking is already cancelled",
            CancelOutcome::AlreadyExpired => "Booking has already expired",
        }
    }
}

/// Owns the booking state machine and the seat holds behind each booking.
pub struct ReservationManager {
    catalog: Arc<dyn CatalogService>,
    ledger: Arc<dyn SeatLedger>,
    bookings: Arc<dyn BookingRepository>,
    transactions: Arc<dyn TransactionRepository>,
    events: Arc<dyn EventPublisher>,
    pricing: PricingEngine,
    rules: BookingRules,
}

impl ReservationManager {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        ledger: Arc<dyn SeatLedger>,
        bookings: Arc<dyn BookingRepository>,
        transactions: Arc<dyn TransactionRepository>,
        events: Arc<dyn EventPublisher>,
        pricing: PricingEngine,
        rules: BookingRules,
    ) -> Self {
        Self {
            catalog,
            ledger,
            bookings,
            transactions,
            events,
            pricing,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Hold the requested seats and persist a PENDING booking for them.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        showtime_id: Uuid,
        seats: Vec<String>,
    ) -> Result<Booking, BookingError> {
        // 1. Validate the request
        validate_seat_selection(&seats)?;

        let showtime = self
            .catalog
            .get_showtime(showtime_id)
            .await?
            .ok_or(BookingError::ShowtimeNotFound(showtime_id))?;

        if !showtime.is_bookable(Utc::now()) {
            return Err(BookingError::ShowtimeInactive(showtime_id));
        }

        if let Some(layout) = &showtime.layout {
            if let Some(unknown) = seats.iter().find(|label| !layout.contains(label)) {
                return Err(BookingError::UnknownSeat(unknown.clone()));
            }
        }

        let total_amount = self.pricing.quote(&showtime, &seats)?;

        // 2. Hold the seats
        let booking_id = Uuid::new_v4();
        let held = self
            .ledger
            .acquire_seats(showtime_id, &seats, booking_id, self.rules.hold_duration)
            .await?;

        // 3. Persist, undoing the hold if that fails
        let booking = Booking::new_pending(
            booking_id,
            user_id,
            showtime_id,
            seats,
            total_amount,
            self.rules.currency.clone(),
            held.expires_at,
        );

        if let Err(e) = self.bookings.insert_booking(&booking).await {
            error!(%booking_id, %showtime_id, "Failed to persist booking, releasing hold: {}", e);
            release_or_flag(self.ledger.as_ref(), &self.rules.release_retry, showtime_id, booking_id).await;
            return Err(e.into());
        }

        info!(%booking_id, %user_id, %showtime_id, seats = ?booking.seats, "Booking created");
        self.publish(BookingEventKind::Created, &booking).await;

        Ok(booking)
    }

    /// User-initiated cancellation of a pending booking.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        requesting_user_id: Uuid,
    ) -> Result<CancelOutcome, BookingError> {
        let booking = self.get_booking(booking_id).await?;

        if booking.user_id != requesting_user_id {
            return Err(BookingError::Forbidden(booking_id));
        }

        match booking.status {
            BookingStatus::Cancelled => return Ok(CancelOutcome::AlreadyCancelled),
            BookingStatus::Expired => return Ok(CancelOutcome::AlreadyExpired),
            // Paid bookings only leave through the refund path
            BookingStatus::Confirmed => {
                return Err(BookingError::InvalidTransition {
                    from: BookingStatus::Confirmed,
                    to: BookingStatus::Cancelled,
                })
            }
            BookingStatus::Pending => {}
        }

        match self.finish_pending(booking_id, BookingStatus::Cancelled).await? {
            Some(_) => Ok(CancelOutcome::Cancelled),
            None => {
                // Lost a race with payment or the sweeper
                let current = self.get_booking(booking_id).await?;
                match current.status {
                    BookingStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
                    BookingStatus::Expired => Ok(CancelOutcome::AlreadyExpired),
                    from => Err(BookingError::InvalidTransition {
                        from,
                        to: BookingStatus::Cancelled,
                    }),
                }
            }
        }
    }

    /// CONFIRMED -> CANCELLED. Frees the seats and marks the captured payment
    /// REFUNDED; moving the money back is up to the payment collaborator.
    pub async fn refund_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let Some(booking) = self
            .bookings
            .compare_and_set_status(booking_id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await?
        else {
            let current = self.get_booking(booking_id).await?;
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to: BookingStatus::Cancelled,
            });
        };

        release_or_flag(
            self.ledger.as_ref(),
            &self.rules.release_retry,
            booking.showtime_id,
            booking.id,
        )
        .await;

        for transaction in self.transactions.list_for_booking(booking_id).await? {
            if transaction.status != TransactionStatus::Success {
                continue;
            }
            let refunded = self
                .transactions
                .compare_and_set_status(transaction.id, TransactionStatus::Success, TransactionStatus::Refunded, None)
                .await?;
            if refunded.is_none() {
                warn!(transaction_id = %transaction.id, "Transaction changed while refunding");
            }
        }

        info!(%booking_id, "Booking refunded");
        self.publish(BookingEventKind::Refunded, &booking).await;
        Ok(booking)
    }

    /// Administrative status change along a legal edge of the state machine.
    pub async fn admin_update_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let current = self.get_booking(booking_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        if current.status == BookingStatus::Confirmed {
            return self.refund_booking(booking_id).await;
        }

        let updated = match status {
            BookingStatus::Confirmed => self.confirm_pending(booking_id).await?,
            other => self.finish_pending(booking_id, other).await?,
        };

        match updated {
            Some(booking) => {
                info!(%booking_id, status = %status, "Booking status set by admin");
                Ok(booking)
            }
            None => {
                let current = self.get_booking(booking_id).await?;
                Err(BookingError::InvalidTransition {
                    from: current.status,
                    to: status,
                })
            }
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    pub async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_user_bookings(user_id).await?)
    }

    /// Held and confirmed seats of a showtime.
    pub async fn seat_map(&self, showtime_id: Uuid) -> Result<BTreeMap<String, SeatState>, BookingError> {
        if self.catalog.get_showtime(showtime_id).await?.is_none() {
            return Err(BookingError::ShowtimeNotFound(showtime_id));
        }
        Ok(self.ledger.seat_map(showtime_id).await?)
    }

    /// PENDING -> CANCELLED/EXPIRED, then free the seats.
    async fn finish_pending(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> Result<Option<Booking>, BookingError> {
        let Some(booking) = self
            .bookings
            .compare_and_set_status(booking_id, BookingStatus::Pending, next)
            .await?
        else {
            return Ok(None);
        };

        release_or_flag(
            self.ledger.as_ref(),
            &self.rules.release_retry,
            booking.showtime_id,
            booking.id,
        )
        .await;

        let kind = if next == BookingStatus::Expired {
            BookingEventKind::Expired
        } else {
            BookingEventKind::Cancelled
        };
        info!(%booking_id, status = %next, "Booking closed");
        self.publish(kind, &booking).await;
        Ok(Some(booking))
    }

    /// PENDING -> CONFIRMED without a payment, then confirm the seats.
    async fn confirm_pending(&self, booking_id: Uuid) -> Result<Option<Booking>, BookingError> {
        let Some(booking) = self
            .bookings
            .compare_and_set_status(booking_id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await?
        else {
            return Ok(None);
        };

        if let Err(e) = self.ledger.confirm_seats(booking.showtime_id, booking.id).await {
            error!(%booking_id, "Booking confirmed but seats could not be confirmed: {}", e);
            if let Err(flag_err) = self.ledger.flag_for_reconciliation(booking.showtime_id).await {
                error!(showtime_id = %booking.showtime_id, "Failed to flag showtime for reconciliation: {}", flag_err);
            }
            return Err(e.into());
        }

        self.publish(BookingEventKind::Confirmed, &booking).await;
        Ok(Some(booking))
    }

    async fn publish(&self, kind: BookingEventKind, booking: &Booking) {
        self.events
            .publish(BookingEvent::new(
                kind,
                booking.id,
                booking.showtime_id,
                booking.user_id,
                booking.seats.clone(),
            ))
            .await;
    }
}
