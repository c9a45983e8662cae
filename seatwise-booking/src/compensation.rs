use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use seatwise_core::SeatLedger;

/// Bounded retry for ledger releases that run as compensating actions.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Release a booking's seats, retrying with linear backoff. When every attempt
/// fails the showtime is flagged so the sweeper reconciles it later.
/// Returns whether the release went through.
pub(crate) async fn release_or_flag(
    ledger: &dyn SeatLedger,
    policy: &RetryPolicy,
    showtime_id: Uuid,
    booking_id: Uuid,
) -> bool {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match ledger.release_seats(showtime_id, booking_id).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(%showtime_id, %booking_id, attempt, "Seat release failed: {}", e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
            }
        }
    }

    error!(%showtime_id, %booking_id, "Seat release gave up, flagging showtime for reconciliation");
    if let Err(e) = ledger.flag_for_reconciliation(showtime_id).await {
        error!(%showtime_id, "Failed to flag showtime for reconciliation: {}", e);
    }
    false
}
