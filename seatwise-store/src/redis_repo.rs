use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, Script};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use seatwise_core::{ExpiredHold, HeldSet, LedgerError, SeatLedger, SeatState};

const SHOWTIME_INDEX_KEY: &str = "seatwise:showtimes";
const RECONCILE_KEY: &str = "seatwise:reconcile";

fn seats_key(showtime_id: Uuid) -> String {
    format!("seatwise:showtime:{}:seats", showtime_id)
}

// Rejects the whole request if any label is already present in the hash.
// Returns the conflicting labels, empty on success.
const ACQUIRE_SCRIPT: &str = r#"
    local taken = {}
    for i = 3, #ARGV do
        if redis.call("HEXISTS", KEYS[1], ARGV[i]) == 1 then
            table.insert(taken, ARGV[i])
        end
    end
    if #taken > 0 then
        return taken
    end
    for i = 3, #ARGV do
        redis.call("HSET", KEYS[1], ARGV[i], ARGV[1])
    end
    redis.call("SADD", KEYS[2], ARGV[2])
    return taken
"#;

// Values look like H|<booking>|<expires_ms> or C|<booking>.
const CONFIRM_SCRIPT: &str = r#"
    local owned = 0
    local fields = redis.call("HGETALL", KEYS[1])
    for i = 1, #fields, 2 do
        local value = fields[i + 1]
        local sep = string.find(value, "|", 3, true)
        local owner = sep and string.sub(value, 3, sep - 1) or string.sub(value, 3)
        if owner == ARGV[1] then
            owned = owned + 1
            if string.sub(value, 1, 1) == "H" then
                redis.call("HSET", KEYS[1], fields[i], "C|" .. ARGV[1])
            end
        end
    end
    return owned
"#;

const RELEASE_SCRIPT: &str = r#"
    local released = 0
    local fields = redis.call("HGETALL", KEYS[1])
    for i = 1, #fields, 2 do
        local value = fields[i + 1]
        local sep = string.find(value, "|", 3, true)
        local owner = sep and string.sub(value, 3, sep - 1) or string.sub(value, 3)
        if owner == ARGV[1] then
            redis.call("HDEL", KEYS[1], fields[i])
            released = released + 1
        end
    end
    if redis.call("HLEN", KEYS[1]) == 0 then
        redis.call("SREM", KEYS[2], ARGV[2])
    end
    return released
"#;

const DRAIN_SCRIPT: &str = r#"
    local members = redis.call("SMEMBERS", KEYS[1])
    redis.call("DEL", KEYS[1])
    return members
"#;

fn encode_hold(booking_id: Uuid, expires_at: DateTime<Utc>) -> String {
    format!("H|{}|{}", booking_id, expires_at.timestamp_millis())
}

fn decode_seat(value: &str) -> Option<SeatState> {
    let mut parts = value.split('|');
    let tag = parts.next()?;
    let booking_id = Uuid::parse_str(parts.next()?).ok()?;
    match tag {
        "H" => {
            let millis: i64 = parts.next()?.parse().ok()?;
            let expires_at = Utc.timestamp_millis_opt(millis).single()?;
            Some(SeatState::Held { booking_id, expires_at })
        }
        "C" => Some(SeatState::Confirmed { booking_id }),
        _ => None,
    }
}

fn ledger_err(e: RedisError) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

/// Seat ledger shared by every API instance. Each showtime is one Redis hash
/// and every mutation runs as a single Lua script.
#[derive(Clone)]
pub struct RedisSeatLedger {
    client: redis::Client,
    acquire: Script,
    confirm: Script,
    release: Script,
    drain: Script,
}

impl RedisSeatLedger {
    pub fn new(connection_string: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis seat ledger configured");
        Ok(Self {
            client,
            acquire: Script::new(ACQUIRE_SCRIPT),
            confirm: Script::new(CONFIRM_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
            drain: Script::new(DRAIN_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, LedgerError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(ledger_err)
    }

    async fn read_seats(
        &self,
        conn: &mut MultiplexedConnection,
        showtime_id: Uuid,
    ) -> Result<BTreeMap<String, SeatState>, LedgerError> {
        let raw: HashMap<String, String> = conn.hgetall(seats_key(showtime_id)).await.map_err(ledger_err)?;

        let mut seats = BTreeMap::new();
        for (label, value) in raw {
            match decode_seat(&value) {
                Some(state) => {
                    seats.insert(label, state);
                }
                None => {
                    return Err(LedgerError::Backend(format!(
                        "unreadable seat entry {label}={value} for showtime {showtime_id}"
                    )))
                }
            }
        }
        Ok(seats)
    }
}

#[async_trait]
impl SeatLedger for RedisSeatLedger {
    async fn acquire_seats(
        &self,
        showtime_id: Uuid,
        seats: &[String],
        booking_id: Uuid,
        hold: Duration,
    ) -> Result<HeldSet, LedgerError> {
        let mut conn = self.connection().await?;
        let expires_at = Utc::now() + hold;

        let mut invocation = self.acquire.prepare_invoke();
        invocation
            .key(seats_key(showtime_id))
            .key(SHOWTIME_INDEX_KEY)
            .arg(encode_hold(booking_id, expires_at))
            .arg(showtime_id.to_string());
        for label in seats {
            invocation.arg(label);
        }

        let conflicts: Vec<String> = invocation.invoke_async(&mut conn).await.map_err(ledger_err)?;
        if !conflicts.is_empty() {
            debug!(%showtime_id, %booking_id, ?conflicts, "Seat acquisition rejected");
            return Err(LedgerError::Conflict { seats: conflicts });
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
        let mut conn = self.connection().await?;
        let owned: i64 = self
            .confirm
            .key(seats_key(showtime_id))
            .arg(booking_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(ledger_err)?;

        if owned == 0 {
            return Err(LedgerError::NotHeld { showtime_id, booking_id });
        }
        debug!(%showtime_id, %booking_id, count = owned, "Seats confirmed");
        Ok(())
    }

    async fn release_seats(&self, showtime_id: Uuid, booking_id: Uuid) -> Result<(), LedgerError> {
        let mut conn = self.connection().await?;
        let released: i64 = self
            .release
            .key(seats_key(showtime_id))
            .key(SHOWTIME_INDEX_KEY)
            .arg(booking_id.to_string())
            .arg(showtime_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(ledger_err)?;

        if released > 0 {
            debug!(%showtime_id, %booking_id, count = released, "Seats released");
        }
        Ok(())
    }

    async fn seat_map(&self, showtime_id: Uuid) -> Result<BTreeMap<String, SeatState>, LedgerError> {
        let mut conn = self.connection().await?;
        self.read_seats(&mut conn, showtime_id).await
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredHold>, LedgerError> {
        let mut conn = self.connection().await?;
        let showtimes: Vec<String> = conn.smembers(SHOWTIME_INDEX_KEY).await.map_err(ledger_err)?;

        let mut holds = Vec::new();
        for raw_id in showtimes {
            let Ok(showtime_id) = Uuid::parse_str(&raw_id) else {
                continue;
            };

            let mut by_booking: BTreeMap<Uuid, ExpiredHold> = BTreeMap::new();
            for (label, seat) in self.read_seats(&mut conn, showtime_id).await? {
                if let SeatState::Held { booking_id, expires_at } = seat {
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
                            .push(label);
                    }
                }
            }
            holds.extend(by_booking.into_values());
        }
        Ok(holds)
    }

    async fn flag_for_reconciliation(&self, showtime_id: Uuid) -> Result<(), LedgerError> {
        let mut conn = self.connection().await?;
        conn.sadd::<_, _, ()>(RECONCILE_KEY, showtime_id.to_string())
            .await
            .map_err(ledger_err)
    }

    async fn take_flagged(&self) -> Result<Vec<Uuid>, LedgerError> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = self
            .drain
            .key(RECONCILE_KEY)
            .invoke_async(&mut conn)
            .await
            .map_err(ledger_err)?;

        Ok(raw.iter().filter_map(|id| Uuid::parse_str(id).ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_entries_decode() {
        let booking_id = Uuid::new_v4();
        let expires_at = Utc.timestamp_millis_opt(1_800_000_000_123).unwrap();

        assert_eq!(
            decode_seat(&encode_hold(booking_id, expires_at)),
            Some(SeatState::Held { booking_id, expires_at })
        );
        assert_eq!(
            decode_seat(&format!("C|{}", booking_id)),
            Some(SeatState::Confirmed { booking_id })
        );
    }

    #[test]
    fn test_malformed_entries_are_rejected() {
        assert_eq!(decode_seat(""), None);
        assert_eq!(decode_seat("H|not-a-uuid|1"), None);
        assert_eq!(decode_seat(&format!("H|{}", Uuid::new_v4())), None);
        assert_eq!(decode_seat(&format!("X|{}", Uuid::new_v4())), None);
    }

    #[test]
    fn test_seat_keys_are_per_showtime() {
        let id = Uuid::nil();
        assert_eq!(seats_key(id), "seatwise:showtime:00000000-0000-0000-0000-000000000000:seats");
    }
}
