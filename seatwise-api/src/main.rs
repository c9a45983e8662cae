use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use seatwise_api::metrics::Metrics;
use seatwise_api::state::{expiry_sweeper, AppState, Backends};
use seatwise_api::{app, worker};
use seatwise_booking::InMemorySeatLedger;
use seatwise_catalog::InMemoryCatalog;
use seatwise_core::SeatLedger;
use seatwise_store::{BroadcastPublisher, DbClient, MemoryStore, PgStore, RedisSeatLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatwise_api=debug,seatwise_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = seatwise_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Seatwise API on port {}", config.server.port);

    // Seat ledger
    let ledger: Arc<dyn SeatLedger> = match &config.redis {
        Some(redis) => Arc::new(RedisSeatLedger::new(&redis.url).expect("Invalid Redis URL")),
        None => {
            tracing::warn!("No Redis configured, seat ledger is local to this process");
            Arc::new(InMemorySeatLedger::new())
        }
    };

    // Bookings, transactions and showtimes
    let backends = match &config.database {
        Some(database) => {
            let db = DbClient::new(&database.url)
                .await
                .expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");
            let store = Arc::new(PgStore::new(db.pool.clone()));
            Backends {
                catalog: store.clone(),
                ledger,
                bookings: store.clone(),
                transactions: store,
            }
        }
        None => {
            tracing::warn!("No database configured, bookings are kept in memory");
            let store = Arc::new(MemoryStore::new());
            Backends {
                catalog: Arc::new(InMemoryCatalog::new()),
                ledger,
                bookings: store.clone(),
                transactions: store,
            }
        }
    };
    let rules = config.business_rules.clone();

    let publisher = BroadcastPublisher::default();
    let metrics = Arc::new(Metrics::new().expect("Failed to register metrics"));
    let app_state = AppState::new(&backends, &rules, publisher.clone(), metrics.clone());

    // Expiry sweeper
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = expiry_sweeper(&backends, &rules, &publisher);
    let interval = Duration::from_secs(rules.sweep_interval_seconds.max(1));
    let sweeper_handle = tokio::spawn(worker::start_expiry_worker(sweeper, interval, shutdown_rx, metrics));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
}
