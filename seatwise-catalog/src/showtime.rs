use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::CatalogError;

/// Highest accepted base price, in minor units.
pub const MAX_BASE_PRICE: i64 = 1_000_000_000;

/// Physical seat grid of the screen a showtime plays on.
///
/// Labels are a row in letters (`A`..`Z`, `AA`..) followed by a 1-based
/// column number, e.g. `C12`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatLayout {
    pub rows: u32,
    pub columns: u32,
    /// Seat label -> seat type, e.g. `{"A1": "GOLD"}`
    #[serde(default)]
    pub seat_types: HashMap<String, String>,
}

impl SeatLayout {
    pub fn contains(&self, label: &str) -> bool {
        match parse_label(label) {
            Some((row, column)) => {
                (1..=self.rows).contains(&row) && (1..=self.columns).contains(&column)
            }
            None => false,
        }
    }

    pub fn seat_type(&self, label: &str) -> Option<&str> {
        self.seat_types.get(label).map(String::as_str)
    }
}

/// Split `AB12` into (row 28, column 12).
fn parse_label(label: &str) -> Option<(u32, u32)> {
    let split = label.find(|c: char| !c.is_ascii_uppercase())?;
    let (letters, digits) = label.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut row: u32 = 0;
    for c in letters.chars() {
        row = row.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)?;
    }
    let column = digits.parse().ok()?;
    Some((row, column))
}

/// A scheduled screening of a movie on a given screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub theater_id: Uuid,
    pub screen_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Price of a standard seat in minor currency units.
    pub base_price: i64,
    pub is_active: bool,
    pub layout: Option<SeatLayout>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    /// Active and not yet started.
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_time > now
    }

    /// Apply the set fields of `patch`; unset fields are left untouched.
    /// Showtimes that already started are immutable.
    pub fn apply_patch(&mut self, patch: ShowtimePatch, now: DateTime<Utc>) -> Result<(), CatalogError> {
        if self.start_time <= now {
            return Err(CatalogError::Locked(self.id));
        }

        let mut next = self.clone();
        if let Some(start_time) = patch.start_time {
            next.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            next.end_time = end_time;
        }
        if let Some(base_price) = patch.base_price {
            next.base_price = base_price;
        }
        if let Some(is_active) = patch.is_active {
            next.is_active = is_active;
        }
        if let Some(layout) = patch.layout {
            next.layout = Some(layout);
        }

        validate_schedule(next.start_time, next.end_time, next.base_price)?;

        next.updated_at = now;
        *self = next;
        Ok(())
    }
}

/// Fields required to schedule a new showtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShowtime {
    pub movie_id: Uuid,
    pub theater_id: Uuid,
    pub screen_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_price: i64,
    #[serde(default)]
    pub layout: Option<SeatLayout>,
}

impl NewShowtime {
    pub fn into_showtime(self) -> Result<Showtime, CatalogError> {
        validate_schedule(self.start_time, self.end_time, self.base_price)?;

        let now = Utc::now();
        Ok(Showtime {
            id: Uuid::new_v4(),
            movie_id: self.movie_id,
            theater_id: self.theater_id,
            screen_id: self.screen_id,
            start_time: self.start_time,
            end_time: self.end_time,
            base_price: self.base_price,
            is_active: true,
            layout: self.layout,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a showtime. `None` means "leave as is".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowtimePatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub base_price: Option<i64>,
    pub is_active: Option<bool>,
    pub layout: Option<SeatLayout>,
}

fn validate_schedule(start_time: DateTime<Utc>, end_time: DateTime<Utc>, base_price: i64) -> Result<(), CatalogError> {
    if base_price <= 0 {
        return Err(CatalogError::Invalid("base_price must be positive".to_string()));
    }
    if base_price > MAX_BASE_PRICE {
        return Err(CatalogError::Invalid(format!("base_price must not exceed {}", MAX_BASE_PRICE)));
    }
    if end_time <= start_time {
        return Err(CatalogError::Invalid("end_time must be after start_time".to_string()));
    }
    Ok(())
}
