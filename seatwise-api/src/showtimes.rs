use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

use seatwise_catalog::{CatalogError, NewShowtime, Showtime, ShowtimePatch};
use seatwise_core::SeatState;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/showtimes/{id}", get(get_showtime))
        .route("/v1/showtimes/{id}/seats", get(get_seat_map))
        .route("/v1/showtimes/{id}/stream", get(stream_showtime_events))
        .route("/v1/movies/{id}/showtimes", get(list_movie_showtimes))
        .route("/v1/theaters/{id}/showtimes", get(list_theater_showtimes))
        .route("/v1/admin/showtimes", post(create_showtime))
        .route("/v1/admin/showtimes/{id}", patch(update_showtime).delete(delete_showtime))
}

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub showtime_id: Uuid,
    /// Only HELD and CONFIRMED seats are listed
    pub seats: BTreeMap<String, SeatState>,
}

async fn get_showtime(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Showtime>, AppError> {
    let showtime = state.catalog.get_showtime(id).await?.ok_or(CatalogError::NotFound(id))?;
    Ok(Json(showtime))
}

async fn list_movie_showtimes(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> Result<Json<Vec<Showtime>>, AppError> {
    Ok(Json(state.catalog.list_movie_showtimes(movie_id).await?))
}

async fn list_theater_showtimes(
    State(state): State<AppState>,
    Path(theater_id): Path<Uuid>,
) -> Result<Json<Vec<Showtime>>, AppError> {
    Ok(Json(state.catalog.list_theater_showtimes(theater_id).await?))
}

async fn create_showtime(
    State(state): State<AppState>,
    Json(req): Json<NewShowtime>,
) -> Result<(StatusCode, Json<Showtime>), AppError> {
    let showtime = state.catalog.create_showtime(req).await?;
    Ok((StatusCode::CREATED, Json(showtime)))
}

async fn update_showtime(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ShowtimePatch>,
) -> Result<Json<Showtime>, AppError> {
    let showtime = state.catalog.update_showtime(id, patch).await?;
    info!(showtime_id = %id, "Showtime updated");
    Ok(Json(showtime))
}

async fn delete_showtime(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    if state.catalog.delete_showtime(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CatalogError::NotFound(id).into())
    }
}

async fn get_seat_map(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let seats = state.manager.seat_map(showtime_id).await?;
    Ok(Json(SeatMapResponse { showtime_id, seats }))
}

/// Live booking events for one showtime as server-sent events.
async fn stream_showtime_events(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if state.catalog.get_showtime(showtime_id).await?.is_none() {
        return Err(CatalogError::NotFound(showtime_id).into());
    }

    let stream = BroadcastStream::new(state.publisher.subscribe()).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.showtime_id == showtime_id => {
                match Event::default().event(event.kind.as_str()).json_data(&event) {
                    Ok(sse_event) => Some(Ok::<_, Infallible>(sse_event)),
                    Err(e) => {
                        debug!("Failed to encode booking event: {}", e);
                        None
                    }
                }
            }
            Ok(_) => None,
            // Slow subscriber; skip what was missed
            Err(e) => {
                debug!(%showtime_id, "Event stream lagged: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
