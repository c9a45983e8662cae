use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::showtime::Showtime;
use crate::CatalogError;

/// Weight of a standard seat: 100.00%.
pub const STANDARD_WEIGHT_BPS: u32 = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Multipliers per seat type in basis points (e.g. "GOLD" => 15000 for 1.5x)
    #[serde(default)]
    pub seat_type_weights: HashMap<String, u32>,
}

/// Seat-type-weighted ticket pricing
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Weight applied to a seat, falling back to the standard weight for
    /// untyped seats and unknown types.
    pub fn weight_for(&self, showtime: &Showtime, label: &str) -> u32 {
        showtime
            .layout
            .as_ref()
            .and_then(|layout| layout.seat_type(label))
            .and_then(|seat_type| self.config.seat_type_weights.get(seat_type))
            .copied()
            .unwrap_or(STANDARD_WEIGHT_BPS)
    }

    /// Price of one seat, rounded half up to the minor unit. `None` when the
    /// amount does not fit in an i64.
    pub fn seat_price(&self, showtime: &Showtime, label: &str) -> Option<i64> {
        let weight = i64::from(self.weight_for(showtime, label));
        let bps = i64::from(STANDARD_WEIGHT_BPS);
        let scaled = showtime.base_price.checked_mul(weight)?.checked_add(bps / 2)?;
        Some(scaled / bps)
    }

    /// Total for a seat selection.
    pub fn quote(&self, showtime: &Showtime, seats: &[String]) -> Result<i64, CatalogError> {
        seats
            .iter()
            .try_fold(0i64, |total, label| {
                self.seat_price(showtime, label)
                    .and_then(|price| total.checked_add(price))
            })
            .ok_or_else(|| CatalogError::Invalid(format!("price of {} seats is out of range", seats.len())))
    }
}
