use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use seatwise_catalog::{CatalogError, CatalogService, NewShowtime, SeatLayout, Showtime, ShowtimePatch};

use crate::booking_repo::PgStore;

const SHOWTIME_COLUMNS: &str = "id, movie_id, theater_id, screen_id, start_time, end_time, base_price, \
     is_active, layout, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_id: Uuid,
    theater_id: Uuid,
    screen_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    base_price: i64,
    is_active: bool,
    layout: Option<Json<SeatLayout>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShowtimeRow> for Showtime {
    fn from(row: ShowtimeRow) -> Self {
        Showtime {
            id: row.id,
            movie_id: row.movie_id,
            theater_id: row.theater_id,
            screen_id: row.screen_id,
            start_time: row.start_time,
            end_time: row.end_time,
            base_price: row.base_price,
            is_active: row.is_active,
            layout: row.layout.map(|Json(layout)| layout),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn catalog_err(e: sqlx::Error) -> CatalogError {
    if e.as_database_error().is_some_and(|d| d.is_foreign_key_violation()) {
        return CatalogError::Invalid("showtime still has bookings".to_string());
    }
    CatalogError::Backend(e.to_string())
}

impl PgStore {
    async fn list_showtimes_by(&self, column: &str, id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE {column} = $1 ORDER BY start_time"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        Ok(rows.into_iter().map(Showtime::from).collect())
    }
}

#[async_trait]
impl CatalogService for PgStore {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!("SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(catalog_err)?;

        Ok(row.map(Showtime::from))
    }

    async fn list_movie_showtimes(&self, movie_id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
        self.list_showtimes_by("movie_id", movie_id).await
    }

    async fn list_theater_showtimes(&self, theater_id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
        self.list_showtimes_by("theater_id", theater_id).await
    }

    async fn create_showtime(&self, new: NewShowtime) -> Result<Showtime, CatalogError> {
        let showtime = new.into_showtime()?;

        sqlx::query(
            r#"
            INSERT INTO showtimes (id, movie_id, theater_id, screen_id, start_time, end_time, base_price, is_active, layout, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.theater_id)
        .bind(showtime.screen_id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.base_price)
        .bind(showtime.is_active)
        .bind(showtime.layout.clone().map(Json))
        .bind(showtime.created_at)
        .bind(showtime.updated_at)
        .execute(&self.pool)
        .await
        .map_err(catalog_err)?;

        info!(showtime_id = %showtime.id, movie_id = %showtime.movie_id, "Showtime created");
        Ok(showtime)
    }

    async fn update_showtime(&self, id: Uuid, patch: ShowtimePatch) -> Result<Showtime, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(catalog_err)?;

        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(catalog_err)?;

        let mut showtime = row.map(Showtime::from).ok_or(CatalogError::NotFound(id))?;
        showtime.apply_patch(patch, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE showtimes
            SET start_time = $2, end_time = $3, base_price = $4, is_active = $5, layout = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(showtime.id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.base_price)
        .bind(showtime.is_active)
        .bind(showtime.layout.clone().map(Json))
        .bind(showtime.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(catalog_err)?;

        tx.commit().await.map_err(catalog_err)?;
        Ok(showtime)
    }

    async fn delete_showtime(&self, id: Uuid) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM showtimes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(catalog_err)?;

        Ok(result.rows_affected() > 0)
    }
}
