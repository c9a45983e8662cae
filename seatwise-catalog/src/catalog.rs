use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::showtime::{NewShowtime, Showtime, ShowtimePatch};
use crate::CatalogError;

/// Showtime lookup and maintenance. The booking core only reads through
/// `get_showtime`; the rest is catalog administration.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError>;

    async fn list_movie_showtimes(&self, movie_id: Uuid) -> Result<Vec<Showtime>, CatalogError>;

    async fn list_theater_showtimes(&self, theater_id: Uuid) -> Result<Vec<Showtime>, CatalogError>;

    async fn create_showtime(&self, new: NewShowtime) -> Result<Showtime, CatalogError>;

    async fn update_showtime(&self, id: Uuid, patch: ShowtimePatch) -> Result<Showtime, CatalogError>;

    /// Returns false if the showtime did not exist.
    async fn delete_showtime(&self, id: Uuid) -> Result<bool, CatalogError>;
}

/// Catalog kept in process memory
#[derive(Default)]
pub struct InMemoryCatalog {
    showtimes: RwLock<HashMap<Uuid, Showtime>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built showtime as is, bypassing validation.
    pub async fn insert(&self, showtime: Showtime) {
        self.showtimes.write().await.insert(showtime.id, showtime);
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn get_showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
        Ok(self.showtimes.read().await.get(&id).cloned())
    }

    async fn list_movie_showtimes(&self, movie_id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
        let mut showtimes: Vec<Showtime> = self
            .showtimes
            .read()
            .await
            .values()
            .filter(|s| s.movie_id == movie_id)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| s.start_time);
        Ok(showtimes)
    }

    async fn list_theater_showtimes(&self, theater_id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
        let mut showtimes: Vec<Showtime> = self
            .showtimes
            .read()
            .await
            .values()
            .filter(|s| s.theater_id == theater_id)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| s.start_time);
        Ok(showtimes)
    }

    async fn create_showtime(&self, new: NewShowtime) -> Result<Showtime, CatalogError> {
        let showtime = new.into_showtime()?;
        self.showtimes.write().await.insert(showtime.id, showtime.clone());
        info!(showtime_id = %showtime.id, movie_id = %showtime.movie_id, "Showtime created");
        Ok(showtime)
    }

    async fn update_showtime(&self, id: Uuid, patch: ShowtimePatch) -> Result<Showtime, CatalogError> {
        let mut showtimes = self.showtimes.write().await;
        let showtime = showtimes.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        showtime.apply_patch(patch, Utc::now())?;
        info!(showtime_id = %id, "Showtime updated");
        Ok(showtime.clone())
    }

    async fn delete_showtime(&self, id: Uuid) -> Result<bool, CatalogError> {
        let removed = self.showtimes.write().await.remove(&id).is_some();
        if removed {
            info!(showtime_id = %id, "Showtime deleted");
        }
        Ok(removed)
    }
}
