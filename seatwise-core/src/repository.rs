use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::payment::{Transaction, TransactionStatus};
use crate::StoreResult;

/// Repository trait for booking documents
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn list_user_bookings(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;

    /// Swap the status only if it currently equals `expected`.
    /// Returns the updated booking, or `None` when the booking is missing or
    /// its status differs.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> StoreResult<Option<Booking>>;

    /// Pending bookings whose deadline is at or before `now`, oldest first.
    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Booking>>;
}

/// Repository trait for payment transactions
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Fails with `StoreError::Conflict` if the booking already has an
    /// INITIATED or SUCCESS transaction.
    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()>;

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;

    async fn list_for_booking(&self, booking_id: Uuid) -> StoreResult<Vec<Transaction>>;

    /// Swap the status only if it currently equals `expected`. A `Some`
    /// gateway reference replaces the stored one.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        gateway_reference: Option<String>,
    ) -> StoreResult<Option<Transaction>>;
}
