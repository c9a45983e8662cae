use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use seatwise_booking::{BookingError, PaymentError};
use seatwise_catalog::CatalogError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let msg = err.to_string();
        match err {
            BookingError::EmptySeatSelection
            | BookingError::InvalidSeatLabel(_)
            | BookingError::DuplicateSeat(_)
            | BookingError::UnknownSeat(_) => AppError::ValidationError(msg),
            BookingError::ShowtimeNotFound(_) | BookingError::BookingNotFound(_) => AppError::NotFoundError(msg),
            BookingError::Forbidden(_) => AppError::AuthorizationError(msg),
            BookingError::ShowtimeInactive(_)
            | BookingError::SeatConflict(_)
            | BookingError::InvalidTransition { .. } => AppError::ConflictError(msg),
            BookingError::Catalog(e) => e.into(),
            BookingError::Storage(_) | BookingError::Ledger(_) => AppError::InternalServerError(msg),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let msg = err.to_string();
        match err {
            PaymentError::BookingNotFound(_) | PaymentError::UnknownTransaction(_) => AppError::NotFoundError(msg),
            PaymentError::InvalidBookingState { .. }
            | PaymentError::TransactionInFlight(_)
            | PaymentError::AlreadyFinalized { .. } => AppError::ConflictError(msg),
            PaymentError::HoldExpired(_) | PaymentError::ReservationLost(_) => AppError::GoneError(msg),
            PaymentError::Storage(_) | PaymentError::Ledger(_) => AppError::InternalServerError(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let msg = err.to_string();
        match err {
            CatalogError::NotFound(_) => AppError::NotFoundError(msg),
            CatalogError::Invalid(_) => AppError::ValidationError(msg),
            CatalogError::Locked(_) => AppError::ConflictError(msg),
            CatalogError::Backend(_) => AppError::InternalServerError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_statuses() {
        assert_eq!(status_of(BookingError::EmptySeatSelection.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BookingError::Forbidden(Uuid::nil()).into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(BookingError::SeatConflict(vec!["A1".to_string()]).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(BookingError::BookingNotFound(Uuid::nil()).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BookingError::Catalog(CatalogError::Locked(Uuid::nil())).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_payment_errors_map_to_statuses() {
        assert_eq!(status_of(PaymentError::TransactionInFlight(Uuid::nil()).into()), StatusCode::CONFLICT);
        assert_eq!(status_of(PaymentError::ReservationLost(Uuid::nil()).into()), StatusCode::GONE);
        assert_eq!(status_of(PaymentError::UnknownTransaction(Uuid::nil()).into()), StatusCode::NOT_FOUND);
    }
}
