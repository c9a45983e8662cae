use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use seatwise_core::{BookingRepository, BookingStatus, EventPublisher, SeatLedger, SeatState};
use seatwise_shared::models::events::{BookingEvent, BookingEventKind};

use crate::compensation::{release_or_flag, RetryPolicy};

/// Default pause between two sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_BATCH_SIZE: usize = 500;

/// What a single sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// PENDING bookings moved to EXPIRED
    pub expired: usize,
    /// Holds released because no live booking owns them
    pub orphans_released: usize,
    /// Stale holds of CONFIRMED bookings turned into confirmed seats
    pub holds_reconfirmed: usize,
    pub elapsed: Duration,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.orphans_released == 0 && self.holds_reconfirmed == 0
    }
}

/// Reclaims seats from bookings whose hold ran out.
pub struct ExpirySweeper {
    ledger: Arc<dyn SeatLedger>,
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn EventPublisher>,
    release_retry: RetryPolicy,
    batch_size: usize,
}

impl ExpirySweeper {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn EventPublisher>,
        release_retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            bookings,
            events,
            release_retry,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sweep on a fixed interval until `shutdown` flips to true or its sender
    /// goes away. `on_report` sees the outcome of every sweep.
    pub async fn run<F>(&self, interval: Duration, mut shutdown: watch::Receiver<bool>, mut on_report: F)
    where
        F: FnMut(&SweepReport) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Expiry sweeper started, interval {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if !report.is_empty() {
                        info!(
                            expired = report.expired,
                            orphans_released = report.orphans_released,
                            holds_reconfirmed = report.holds_reconfirmed,
                            "Sweep finished"
                        );
                    }
                    on_report(&report);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_once_at(Utc::now()).await
    }

    /// One full pass as if the clock read `now`.
    pub async fn sweep_once_at(&self, now: DateTime<Utc>) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();
        self.expire_overdue_bookings(now, &mut report).await;
        self.reconcile_holds(now, &mut report).await;
        report.elapsed = started.elapsed();
        report
    }

    /// Pass 1: PENDING bookings past their deadline.
    async fn expire_overdue_bookings(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        loop {
            let overdue = match self.bookings.find_overdue_pending(now, self.batch_size).await {
                Ok(overdue) => overdue,
                Err(e) => {
                    error!("Failed to scan for overdue bookings: {}", e);
                    return;
                }
            };
            let batch_len = overdue.len();

            let mut progressed = false;
            for candidate in overdue {
                // Payment may have confirmed it since the scan
                let booking = match self
                    .bookings
                    .compare_and_set_status(candidate.id, BookingStatus::Pending, BookingStatus::Expired)
                    .await
                {
                    Ok(Some(booking)) => booking,
                    Ok(None) => {
                        debug!(booking_id = %candidate.id, "Booking left PENDING before it could expire");
                        progressed = true;
                        continue;
                    }
                    Err(e) => {
                        error!(booking_id = %candidate.id, "Failed to expire booking: {}", e);
                        continue;
                    }
                };
                progressed = true;

                release_or_flag(self.ledger.as_ref(), &self.release_retry, booking.showtime_id, booking.id).await;
                report.expired += 1;

                info!(booking_id = %booking.id, showtime_id = %booking.showtime_id, "Booking expired");
                self.events
                    .publish(BookingEvent::new(
                        BookingEventKind::Expired,
                        booking.id,
                        booking.showtime_id,
                        booking.user_id,
                        booking.seats.clone(),
                    ))
                    .await;
            }

            if batch_len < self.batch_size || !progressed {
                return;
            }
        }
    }

    /// Pass 2: ledger holds that outlived their deadline, plus every owner on
    /// showtimes flagged after a failed release.
    async fn reconcile_holds(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        // (showtime, booking) -> latest deadline among its HELD seats, None if
        // every seat is already confirmed
        let mut owners: BTreeMap<(Uuid, Uuid), Option<DateTime<Utc>>> = BTreeMap::new();

        match self.ledger.expired_holds(now).await {
            Ok(holds) => {
                for hold in holds {
                    merge_hold(owners.entry((hold.showtime_id, hold.booking_id)).or_default(), hold.expires_at);
                }
            }
            Err(e) => error!("Failed to scan ledger for expired holds: {}", e),
        }

        let flagged = match self.ledger.take_flagged().await {
            Ok(flagged) => flagged,
            Err(e) => {
                error!("Failed to read reconciliation flags: {}", e);
                Vec::new()
            }
        };
        let mut unresolved: BTreeSet<Uuid> = BTreeSet::new();
        for showtime_id in &flagged {
            match self.ledger.seat_map(*showtime_id).await {
                Ok(seats) => {
                    for seat in seats.values() {
                        match *seat {
                            SeatState::Held { booking_id, expires_at } => {
                                merge_hold(owners.entry((*showtime_id, booking_id)).or_default(), expires_at);
                            }
                            SeatState::Confirmed { booking_id } => {
                                owners.entry((*showtime_id, booking_id)).or_default();
                            }
                            SeatState::Free => {}
                        }
                    }
                }
                Err(e) => {
                    error!(%showtime_id, "Failed to read seat map for reconciliation: {}", e);
                    unresolved.insert(*showtime_id);
                }
            }
        }

        for ((showtime_id, booking_id), held_until) in owners {
            if !self.resolve_owner(showtime_id, booking_id, held_until, now, report).await {
                unresolved.insert(showtime_id);
            }
        }
        for showtime_id in unresolved {
            if let Err(e) = self.ledger.flag_for_reconciliation(showtime_id).await {
                error!(%showtime_id, "Failed to re-flag showtime for reconciliation: {}", e);
            }
        }
    }

    /// Bring one owner's seats in line with its booking. Returns false when
    /// the attempt should be repeated on a later sweep.
    async fn resolve_owner(
        &self,
        showtime_id: Uuid,
        booking_id: Uuid,
        held_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> bool {
        let booking = match self.bookings.get_booking(booking_id).await {
            Ok(booking) => booking,
            Err(e) => {
                error!(%booking_id, "Failed to load booking for hold reconciliation: {}", e);
                return false;
            }
        };

        match booking.map(|b| b.status) {
            // Pending bookings are handled by pass 1 once overdue
            Some(BookingStatus::Pending) => true,
            Some(BookingStatus::Confirmed) => {
                if held_until.is_none() {
                    return true;
                }
                match self.ledger.confirm_seats(showtime_id, booking_id).await {
                    Ok(()) => {
                        warn!(%showtime_id, %booking_id, "Re-confirmed seats of a confirmed booking");
                        report.holds_reconfirmed += 1;
                        true
                    }
                    Err(e) => {
                        error!(%showtime_id, %booking_id, "Failed to re-confirm seats: {}", e);
                        false
                    }
                }
            }
            // A live hold without a booking may belong to a booking still being stored
            None if held_until.is_some_and(|deadline| deadline > now) => {
                debug!(%showtime_id, %booking_id, "Hold has no booking yet, checking again later");
                false
            }
            // Missing, cancelled or expired: nobody owns these seats any more
            _ => match self.ledger.release_seats(showtime_id, booking_id).await {
                Ok(()) => {
                    warn!(%showtime_id, %booking_id, "Released orphaned seats");
                    report.orphans_released += 1;
                    true
                }
                Err(e) => {
                    error!(%showtime_id, %booking_id, "Failed to release orphaned seats: {}", e);
                    false
                }
            },
        }
    }
}

fn merge_hold(held_until: &mut Option<DateTime<Utc>>, expires_at: DateTime<Utc>) {
    *held_until = Some(held_until.map_or(expires_at, |current| current.max(expires_at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemorySeatLedger;
    use seatwise_store::{BroadcastPublisher, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sweeper() -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::new(InMemorySeatLedger::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(BroadcastPublisher::default()),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_report_emptiness() {
        assert!(SweepReport::default().is_empty());
        let report = SweepReport {
            orphans_released: 1,
            ..SweepReport::default()
        };
        assert!(!report.is_empty());
    }

    #[test]
    fn test_merge_hold_keeps_latest_deadline() {
        let now = Utc::now();
        let mut held_until = None;
        merge_hold(&mut held_until, now);
        merge_hold(&mut held_until, now + chrono::Duration::minutes(5));
        merge_hold(&mut held_until, now - chrono::Duration::minutes(5));
        assert_eq!(held_until, Some(now + chrono::Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sweeper = sweeper();
        let (tx, rx) = watch::channel(false);
        let sweeps = Arc::new(AtomicUsize::new(0));
        let counter = sweeps.clone();

        let handle = tokio::spawn(async move {
            sweeper
                .run(Duration::from_millis(5), rx, move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();

        // The first tick fires immediately
        assert!(sweeps.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let sweeper = sweeper();
        let (tx, rx) = watch::channel(false);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), sweeper.run(Duration::from_secs(60), rx, |_| {}))
            .await
            .expect("sweeper did not stop");
    }
}
