pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod memory_repo;
pub mod redis_repo;
pub mod showtime_repo;

pub use app_config::Config;
pub use booking_repo::PgStore;
pub use database::DbClient;
pub use events::BroadcastPublisher;
pub use memory_repo::MemoryStore;
pub use redis_repo::RedisSeatLedger;
