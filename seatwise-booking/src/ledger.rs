use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use seatwise_core::{ExpiredHold, HeldSet, LedgerError, SeatLedger, SeatState};

/// Non-free seats of one showtime. A label missing from the map is FREE.
#[derive(Debug, Default)]
struct ShowtimeSeats {
    seats: HashMap<String, SeatState>,
}

impl ShowtimeSeats {
    fn is_taken(&self, label: &str) -> bool {
        self.seats.get(label).is_some_and(|state| !state.is_free())
    }
}

/// In-process seat ledger with one critical section per showtime.
///
/// The outer map is only write-locked to create a showtime's partition, so
/// acquisitions on unrelated showtimes never wait on each other.
#[derive(Default)]
pub struct InMemorySeatLedger {
    showtimes: RwLock<HashMap<Uuid, Arc<Mutex<ShowtimeSeats>>>>,
    flagged: Mutex<HashSet<Uuid>>,
}

impl InMemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, showtime_id: Uuid) -> Arc<Mutex<ShowtimeSeats>> {
        if let Some(partition) = self.showtimes.read().await.get(&showtime_id) {
            return partition.clone();
        }
        self.showtimes
            .write()
            .await
            .entry(showtime_id)
            .or_default()
            .clone()
    }

    async fn existing_partition(&self, showtime_id: Uuid) -> Option<Arc<Mutex<ShowtimeSeats>>> {
        self.showtimes.read().await.get(&showtime_id).cloned()
    }

    /// Drop a showtime's partition once it holds no seats. Callers reach a
    /// partition only through the map, so with the map write-locked and no
    /// other clone alive nobody can be about to use it.
    async fn prune(&self, showtime_id: Uuid, partition: Arc<Mutex<ShowtimeSeats>>) {
        let mut showtimes = self.showtimes.write().await;
        let unused = Arc::strong_count(&partition) == 2
            && partition.try_lock().is_ok_and(|state| state.seats.is_empty());
        if unused && showtimes.get(&showtime_id).is_some_and(|current| Arc::ptr_eq(current, &partition)) {
            showtimes.remove(&showtime_id);
            debug!(%showtime_id, "Dropped empty seat partition");
        }
    }

    #[cfg(test)]
    async fn partition_count(&self) -> usize {
        self.showtimes.read().await.len()
    }
}

#[async_trait]
impl SeatLedger for InMemorySeatLedger {
    async fn acquire_seats(
        &self,
        showtime_id: Uuid,
        seats: &[String],
        booking_id: Uuid,
        hold: Duration,
    ) -> Result<HeldSet, LedgerError> {
        let partition = self.partition(showtime_id).await;
        let mut state = partition.lock().await;

        let conflicts: Vec<String> = seats
            .iter()
            .filter(|label| state.is_taken(label))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            debug!(%showtime_id, %booking_id, ?conflicts, "Seat acquisition rejected");
            return Err(LedgerError::Conflict { seats: conflicts });
        }

        let expires_at = Utc::now() + hold;
        for label in seats {
            state
                .seats
                .insert(label.clone(), SeatState::Held { booking_id, expires_at });
        }

        debug!(%showtime_id, %booking_id, count = seats.len(), "Seats held");
        Ok(HeldSet {
            showtime_id,
            booking_id,
            seats: seats.to_vec(),
            expires_at,
        })
    }

    async fn confirm_seats(&self, showtime_id: Uuid, booking_id: Uuid) -> Result<(), LedgerError> {
        let not_held = LedgerError::NotHeld { showtime_id, booking_id };
        let partition = self.existing_partition(showtime_id).await.ok_or(not_held.clone())?;
        let mut state = partition.lock().await;

        let mut owned = 0;
        for seat in state.seats.values_mut() {
            let current = *seat;
            match current {
                SeatState::Held { booking_id: owner, .. } if owner == booking_id => {
                    *seat = SeatState::Confirmed { booking_id };
                    owned += 1;
                }
                SeatState::Confirmed { booking_id: owner } if owner == booking_id => owned += 1,
                _ => {}
            }
        }

        if owned == 0 {
            return Err(not_held);
        }
        debug!(%showtime_id, %booking_id, count = owned, "Seats confirmed");
        Ok(())
    }

    async fn release_seats(&self, showtime_id: Uuid, booking_id: Uuid) -> Result<(), LedgerError> {
        let Some(partition) = self.existing_partition(showtime_id).await else {
            return Ok(());
        };
        let mut state = partition.lock().await;

        let before = state.seats.len();
        state.seats.retain(|_, seat| seat.owner() != Some(booking_id));
        let released = before - state.seats.len();
        if released > 0 {
            debug!(%showtime_id, %booking_id, count = released, "Seats released");
        }
        let empty = state.seats.is_empty();
        drop(state);

        if empty {
            self.prune(showtime_id, partition).await;
        }
        Ok(())
    }

    async fn seat_map(&self, showtime_id: Uuid) -> Result<BTreeMap<String, SeatState>, LedgerError> {
        let Some(partition) = self.existing_partition(showtime_id).await else {
            return Ok(BTreeMap::new());
        };
        let state = partition.lock().await;
        Ok(state
            .seats
            .iter()
            .map(|(label, seat)| (label.clone(), *seat))
            .collect())
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredHold>, LedgerError> {
        let partitions: Vec<(Uuid, Arc<Mutex<ShowtimeSeats>>)> = self
            .showtimes
            .read()
            .await
            .iter()
            .map(|(id, partition)| (*id, partition.clone()))
            .collect();

        let mut holds = Vec::new();
        for (showtime_id, partition) in partitions {
            let state = partition.lock().await;
            let mut by_booking: BTreeMap<Uuid, ExpiredHold> = BTreeMap::new();
            for (label, seat) in &state.seats {
                if let SeatState::Held { booking_id, expires_at } = *seat {
                    if expires_at <= now {
                        by_booking
                            .entry(booking_id)
                            .or_insert_with(|| ExpiredHold {
                                showtime_id,
                                booking_id,
                                seats: Vec::new(),
                                expires_at,
                            })
                            .seats
                            .push(label.clone());
                    }
                }
            }
            for mut hold in by_booking.into_values() {
                hold.seats.sort();
                holds.push(hold);
            }
        }
        Ok(holds)
    }

    async fn flag_for_reconciliation(&self, showtime_id: Uuid) -> Result<(), LedgerError> {
        self.flagged.lock().await.insert(showtime_id);
        Ok(())
    }

    async fn take_flagged(&self) -> Result<Vec<Uuid>, LedgerError> {
        Ok(self.flagged.lock().await.drain().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_acquire_is_all_or_nothing() {
        let ledger = InMemorySeatLedger::new();
        let showtime = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        ledger
            .acquire_seats(showtime, &labels(&["A1", "A2"]), first, Duration::minutes(15))
            .await
            .unwrap();

        let err = ledger
            .acquire_seats(showtime, &labels(&["A3", "A2", "A4"]), second, Duration::minutes(15))
            .await
            .unwrap_err();
        match err {
            LedgerError::Conflict { seats } => assert_eq!(seats, labels(&["A2"])),
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing from the failed request was held
        let map = ledger.seat_map(showtime).await.unwrap();
        assert_eq!(map.keys().cloned().collect::<Vec<_>>(), labels(&["A1", "A2"]));
        assert!(map.values().all(|seat| seat.owner() == Some(first)));
    }

    #[tokio::test]
    async fn test_showtimes_are_independent() {
        let ledger = InMemorySeatLedger::new();
        let seats = labels(&["A1"]);

        ledger.acquire_seats(Uuid::new_v4(), &seats, Uuid::new_v4(), Duration::minutes(15)).await.unwrap();
        ledger.acquire_seats(Uuid::new_v4(), &seats, Uuid::new_v4(), Duration::minutes(15)).await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_and_release_are_owner_scoped() {
        let ledger = InMemorySeatLedger::new();
        let showtime = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        ledger.acquire_seats(showtime, &labels(&["B1", "B2"]), owner, Duration::minutes(15)).await.unwrap();

        assert!(matches!(
            ledger.confirm_seats(showtime, stranger).await,
            Err(LedgerError::NotHeld { .. })
        ));
        ledger.release_seats(showtime, stranger).await.unwrap();
        assert_eq!(ledger.seat_map(showtime).await.unwrap().len(), 2);

        ledger.confirm_seats(showtime, owner).await.unwrap();
        // Confirming again is harmless
        ledger.confirm_seats(showtime, owner).await.unwrap();
        let map = ledger.seat_map(showtime).await.unwrap();
        assert!(map.values().all(|seat| *seat == SeatState::Confirmed { booking_id: owner }));

        ledger.release_seats(showtime, owner).await.unwrap();
        ledger.release_seats(showtime, owner).await.unwrap();
        assert!(ledger.seat_map(showtime).await.unwrap().is_empty());
        assert!(matches!(
            ledger.confirm_seats(showtime, owner).await,
            Err(LedgerError::NotHeld { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_partitions_are_dropped() {
        let ledger = InMemorySeatLedger::new();
        let showtime = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        ledger.acquire_seats(showtime, &labels(&["E1"]), first, Duration::minutes(15)).await.unwrap();
        ledger.acquire_seats(showtime, &labels(&["E2"]), second, Duration::minutes(15)).await.unwrap();

        ledger.release_seats(showtime, first).await.unwrap();
        assert_eq!(ledger.partition_count().await, 1);

        ledger.release_seats(showtime, second).await.unwrap();
        assert_eq!(ledger.partition_count().await, 0);

        // The showtime starts over with a fresh partition
        ledger.acquire_seats(showtime, &labels(&["E1"]), Uuid::new_v4(), Duration::minutes(15)).await.unwrap();
        assert_eq!(ledger.seat_map(showtime).await.unwrap().len(), 1);
        assert_eq!(ledger.partition_count().await, 1);
    }

    #[tokio::test]
    async fn test_release_unknown_showtime_is_noop() {
        let ledger = InMemorySeatLedger::new();
        ledger.release_seats(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_holds_grouped_per_booking() {
        let ledger = InMemorySeatLedger::new();
        let showtime = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let paid = Uuid::new_v4();

        ledger.acquire_seats(showtime, &labels(&["C2", "C1"]), stale, Duration::minutes(1)).await.unwrap();
        ledger.acquire_seats(showtime, &labels(&["C3"]), fresh, Duration::minutes(30)).await.unwrap();
        ledger.acquire_seats(showtime, &labels(&["C4"]), paid, Duration::minutes(1)).await.unwrap();
        ledger.confirm_seats(showtime, paid).await.unwrap();

        let holds = ledger.expired_holds(Utc::now() + Duration::minutes(5)).await.unwrap();
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].booking_id, stale);
        assert_eq!(holds[0].seats, labels(&["C1", "C2"]));
    }

    #[tokio::test]
    async fn test_flags_are_drained() {
        let ledger = InMemorySeatLedger::new();
        let showtime = Uuid::new_v4();

        ledger.flag_for_reconciliation(showtime).await.unwrap();
        ledger.flag_for_reconciliation(showtime).await.unwrap();
        assert_eq!(ledger.take_flagged().await.unwrap(), vec![showtime]);
        assert!(ledger.take_flagged().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_acquisitions() {
        let ledger = Arc::new(InMemorySeatLedger::new());
        let showtime = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..32 {
            let ledger = ledger.clone();
            // Every request shares seat "D5" with every other request
            let seats = labels(&["D5", if i % 2 == 0 { "D6" } else { "D7" }]);
            handles.push(tokio::spawn(async move {
                ledger
                    .acquire_seats(showtime, &seats, Uuid::new_v4(), Duration::minutes(15))
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ledger.seat_map(showtime).await.unwrap().len(), 2);
    }
}
