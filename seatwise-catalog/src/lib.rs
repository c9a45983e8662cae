pub mod showtime;
pub mod pricing;
pub mod catalog;

pub use showtime::{NewShowtime, SeatLayout, Showtime, ShowtimePatch, MAX_BASE_PRICE};
pub use pricing::{PricingConfig, PricingEngine};
pub use catalog::{CatalogService, InMemoryCatalog};

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Showtime not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid showtime: {0}")]
    Invalid(String),

    #[error("Showtime {0} has already started and can no longer be modified")]
    Locked(Uuid),

    #[error("Catalog backend error: {0}")]
    Backend(String),
}
