use axum::{
    extract::State,
    http::{header, HeaderName, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod showtimes;
pub mod state;
pub mod transactions;
pub mod worker;

pub use state::{AppState, Backends};

use crate::error::AppError;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::USER_AGENT,
            HeaderName::from_static(identity::USER_ID_HEADER),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(bookings::routes())
        .merge(transactions::routes())
        .merge(showtimes::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, AppError> {
    let body = state.metrics.render().map_err(anyhow::Error::from)?;
    Ok(body)
}
