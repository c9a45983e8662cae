use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use seatwise_booking::{BookingError, CancelOutcome};
use seatwise_core::{Booking, BookingStatus, Transaction};

use crate::error::AppError;
use crate::identity::CallerId;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/mine", get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/transactions", get(list_booking_transactions))
        .route("/v1/admin/bookings/{id}/status", put(update_booking_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub showtime_id: Uuid,
    pub seats: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    /// Seconds left to pay; zero once the booking has left PENDING
    pub hold_remaining_seconds: i64,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        let hold_remaining_seconds = booking.hold_remaining(Utc::now()).num_seconds();
        Self {
            booking,
            hold_remaining_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub booking_id: Uuid,
    pub outcome: CancelOutcome,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

async fn create_booking(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    match state.manager.create_booking(user_id, req.showtime_id, req.seats).await {
        Ok(booking) => {
            state.metrics.bookings_created.inc();
            Ok((StatusCode::CREATED, Json(booking.into())))
        }
        Err(e) => {
            if matches!(e, BookingError::SeatConflict(_)) {
                state.metrics.seat_conflicts.inc();
            }
            Err(e.into())
        }
    }
}

async fn list_my_bookings(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.manager.list_user_bookings(user_id).await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// Load a booking the caller owns.
async fn owned_booking(state: &AppState, booking_id: Uuid, user_id: Uuid) -> Result<Booking, AppError> {
    let booking = state.manager.get_booking(booking_id).await?;
    if booking.user_id != user_id {
        return Err(BookingError::Forbidden(booking_id).into());
    }
    Ok(booking)
}

async fn get_booking(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = owned_booking(&state, booking_id, user_id).await?;
    Ok(Json(booking.into()))
}

async fn cancel_booking(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let outcome = state.manager.cancel_booking(booking_id, user_id).await?;
    Ok(Json(CancelResponse {
        booking_id,
        outcome,
        message: outcome.message(),
    }))
}

async fn list_booking_transactions(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    owned_booking(&state, booking_id, user_id).await?;
    let transactions = state.reconciler.list_transactions(booking_id).await?;
    Ok(Json(transactions))
}

async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.manager.admin_update_status(booking_id, req.status).await?;
    info!(%booking_id, status = %booking.status, "Admin status update applied");
    Ok(Json(booking.into()))
}
