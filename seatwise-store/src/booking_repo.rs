use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use seatwise_core::{
    Booking, BookingRepository, BookingStatus, PaymentMethod, StoreError, StoreResult, Transaction,
    TransactionRepository, TransactionStatus,
};

/// Postgres-backed bookings, transactions and showtimes.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str =
    "id, user_id, showtime_id, seats, total_amount, currency, status, expires_at, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, booking_id, user_id, amount, currency, payment_method, status, \
     gateway_reference, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    showtime_id: Uuid,
    seats: Vec<String>,
    total_amount: i64,
    currency: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            seats: row.seats,
            total_amount: row.total_amount,
            currency: row.currency,
            status: row.status.parse().map_err(|e| StoreError::Backend(format!("{e}")))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    amount: i64,
    currency: String,
    payment_method: String,
    status: String,
    gateway_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let payment_method: PaymentMethod = row
            .payment_method
            .parse()
            .map_err(|e| StoreError::Backend(format!("{e}")))?;
        let status: TransactionStatus = row.status.parse().map_err(|e| StoreError::Backend(format!("{e}")))?;

        Ok(Transaction {
            id: row.id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            payment_method,
            status,
            gateway_reference: row.gateway_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
        return StoreError::Conflict(e.to_string());
    }
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl BookingRepository for PgStore {
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, showtime_id, seats, total_amount, currency, status, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.showtime_id)
        .bind(&booking.seats)
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(booking.status.as_str())
        .bind(booking.expires_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        // The deadline only means something while PENDING
        let keep_deadline = next == BookingStatus::Pending;
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $3,
                expires_at = CASE WHEN $4 THEN expires_at ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(keep_deadline)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings
            WHERE status = 'PENDING' AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[async_trait]
impl TransactionRepository for PgStore {
    async fn insert_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        // uq_transactions_in_flight turns a second live attempt into a unique violation
        sqlx::query(
            r#"
            INSERT INTO transactions (id, booking_id, user_id, amount, currency, payment_method, status, gateway_reference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.booking_id)
        .bind(transaction.user_id)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.payment_method.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_reference)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE booking_id = $1 ORDER BY created_at"
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: TransactionStatus,
        next: TransactionStatus,
        gateway_reference: Option<String>,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET status = $3,
                gateway_reference = COALESCE($4, gateway_reference),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(gateway_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Transaction::try_from).transpose()
    }
}
