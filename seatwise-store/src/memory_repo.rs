use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use seatwise_core::{
    Booking, BookingRepository, BookingStatus, StoreError, StoreResult, Transaction,
    TransactionRepository, TransactionStatus,
};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    transactions: HashMap<Uuid, Transaction>,
}

/// Process-local booking and transaction tables.
///
/// Every write runs under one lock, so compare-and-set and the in-flight
/// transaction check are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&id) {
            Some(booking) if booking.status == expected => {
                booking.set_status(next);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut overdue: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|b| b.expires_at);
        overdue.truncate(limit);
        Ok(overdue)
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let in_flight = tables
            .transactions
            .values()
            .any(|t| t.booking_id == transaction.booking_id && t.status.is_in_flight());
        if in_flight {
            return Err(StoreError::Conflict(format!(
                "booking {} already has a transaction in flight",
                transaction.booking_id
            )));
        }
        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.created_at);
        Ok(transactions)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        gateway_reference: Option<String>,
    ) -> StoreResult<Option<Transaction>> {
        let mut tables = self.tables.write().await;
        match tables.transactions.get_mut(&id) {
            Some(transaction) if transaction.status == expected => {
                transaction.status = next;
                if gateway_reference.is_some() {
                    transaction.gateway_reference = gateway_reference;
                }
                transaction.updated_at = Utc::now();
                Ok(Some(transaction.clone()))
            }
            _ => Ok(None),
        }
    }
}
