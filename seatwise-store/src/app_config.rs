use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Absent: bookings, transactions and showtimes live in memory
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Absent: the seat ledger lives in memory
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_release_retries")]
    pub release_retries: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Seat type -> price weight in basis points (10000 = base price)
    #[serde(default)]
    pub seat_type_weights: HashMap<String, u32>,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            release_retries: default_release_retries(),
            currency: default_currency(),
            seat_type_weights: HashMap::new(),
        }
    }
}

fn default_hold_seconds() -> u64 { 900 }
fn default_sweep_interval_seconds() -> u64 { 60 }
fn default_release_retries() -> u32 { 3 }
fn default_currency() -> String { "INR".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SEATWISE__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("SEATWISE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
