use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity, taken from the `x-user-id` header set by the gateway in
/// front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::AuthenticationError(format!("Missing {} header", USER_ID_HEADER)))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::ValidationError(format!("Invalid {} header", USER_ID_HEADER)))?;

        Ok(CallerId(user_id))
    }
}
