use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use seatwise_core::{
    BookingRepository, BookingStatus, EventPublisher, PaymentMethod, PaymentOutcome, SeatLedger,
    StoreError, Transaction, TransactionRepository, TransactionStatus,
};
use seatwise_shared::models::events::{BookingEvent, BookingEventKind};

use crate::error::PaymentError;

/// Links bookings to payment attempts and applies gateway outcomes.
pub struct PaymentReconciler {
    ledger: Arc<dyn SeatLedger>,
    bookings: Arc<dyn BookingRepository>,
    transactions: Arc<dyn TransactionRepository>,
    events: Arc<dyn EventPublisher>,
}

impl PaymentReconciler {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        bookings: Arc<dyn BookingRepository>,
        transactions: Arc<dyn TransactionRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            bookings,
            transactions,
            events,
        }
    }

    /// Open a new INITIATED transaction for a pending booking.
    pub async fn record_transaction_attempt(
        &self,
        booking_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Transaction, PaymentError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(PaymentError::BookingNotFound(booking_id))?;

        if booking.status != BookingStatus::Pending {
            return Err(PaymentError::InvalidBookingState {
                booking_id,
                status: booking.status,
            });
        }
        if booking.is_overdue(Utc::now()) {
            return Err(PaymentError::HoldExpired(booking_id));
        }

        let transaction = Transaction::initiate(&booking, method);
        match self.transactions.insert_transaction(&transaction).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(PaymentError::TransactionInFlight(booking_id)),
            Err(e) => return Err(e.into()),
        }

        info!(
            transaction_id = %transaction.id,
            %booking_id,
            method = transaction.payment_method.as_str(),
            amount = transaction.amount,
            "Transaction initiated"
        );
        Ok(transaction)
    }

    /// Apply the gateway's verdict on an INITIATED transaction.
    ///
    /// SUCCESS confirms the booking and its seats. FAILED only closes the
    /// transaction: the booking stays PENDING with its seats held so the user
    /// can retry until the hold runs out.
    pub async fn apply_payment_outcome(
        &self,
        transaction_id: Uuid,
        outcome: PaymentOutcome,
        gateway_reference: Option<String>,
    ) -> Result<Transaction, PaymentError> {
        let transaction = self
            .transactions
            .get_transaction(transaction_id)
            .await?
            .ok_or(PaymentError::UnknownTransaction(transaction_id))?;

        if transaction.status != TransactionStatus::Initiated {
            return Err(PaymentError::AlreadyFinalized {
                transaction_id,
                status: transaction.status,
            });
        }

        // 1. Close the transaction; a concurrent callback may beat us here
        let transaction = self.finalize(transaction_id, outcome.status(), gateway_reference).await?;

        if outcome == PaymentOutcome::Failed {
            info!(%transaction_id, booking_id = %transaction.booking_id, "Payment failed, hold kept for retry");
            return Ok(transaction);
        }

        // 2. Promote the booking, only from PENDING
        let booking_id = transaction.booking_id;
        let Some(booking) = self
            .bookings
            .compare_and_set_status(booking_id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await?
        else {
            warn!(%transaction_id, %booking_id, "Payment captured for a booking that is no longer pending");
            self.transactions
                .compare_and_set_status(transaction_id, TransactionStatus::Success, TransactionStatus::Refunded, None)
                .await?;
            return Err(PaymentError::ReservationLost(booking_id));
        };

        // 3. Make the seats permanent
        if let Err(e) = self.ledger.confirm_seats(booking.showtime_id, booking_id).await {
            error!(%booking_id, "Booking confirmed but its seats are not held: {}", e);
            if let Err(flag_err) = self.ledger.flag_for_reconciliation(booking.showtime_id).await {
                error!(showtime_id = %booking.showtime_id, "Failed to flag showtime for reconciliation: {}", flag_err);
            }
            return Err(e.into());
        }

        info!(%transaction_id, %booking_id, "Payment succeeded, booking confirmed");
        self.events
            .publish(BookingEvent::new(
                BookingEventKind::Confirmed,
                booking.id,
                booking.showtime_id,
                booking.user_id,
                booking.seats.clone(),
            ))
            .await;

        Ok(transaction)
    }

    /// All payment attempts for a booking, oldest first.
    pub async fn list_transactions(&self, booking_id: Uuid) -> Result<Vec<Transaction>, PaymentError> {
        if self.bookings.get_booking(booking_id).await?.is_none() {
            return Err(PaymentError::BookingNotFound(booking_id));
        }
        Ok(self.transactions.list_for_booking(booking_id).await?)
    }

    async fn finalize(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        gateway_reference: Option<String>,
    ) -> Result<Transaction, PaymentError> {
        if let Some(updated) = self
            .transactions
            .compare_and_set_status(transaction_id, TransactionStatus::Initiated, status, gateway_reference)
            .await?
        {
            return Ok(updated);
        }

        let current = self
            .transactions
            .get_transaction(transaction_id)
            .await?
            .ok_or(PaymentError::UnknownTransaction(transaction_id))?;
        Err(PaymentError::AlreadyFinalized {
            transaction_id,
            status: current.status,
        })
    }
}
