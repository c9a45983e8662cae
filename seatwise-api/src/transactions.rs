use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use seatwise_booking::BookingError;
use seatwise_core::{PaymentMethod, PaymentOutcome, Transaction};

use crate::error::AppError;
use crate::identity::CallerId;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/transactions", post(create_transaction))
        .route("/v1/transactions/{id}/outcome", post(apply_outcome))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub booking_id: Uuid,
    pub payment_method: PaymentMethod,
}

/// Gateway callback payload
#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    pub outcome: PaymentOutcome,
    #[serde(default)]
    pub gateway_reference: Option<String>,
}

async fn create_transaction(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let booking = state.manager.get_booking(req.booking_id).await?;
    if booking.user_id != user_id {
        return Err(BookingError::Forbidden(req.booking_id).into());
    }

    let transaction = state
        .reconciler
        .record_transaction_attempt(req.booking_id, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn apply_outcome(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
    Json(req): Json<OutcomeRequest>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .reconciler
        .apply_payment_outcome(transaction_id, req.outcome, req.gateway_reference)
        .await?;
    Ok(Json(transaction))
}
