use std::sync::Arc;
use tracing::warn;

use seatwise_booking::{
    BookingRules, ExpirySweeper, InMemorySeatLedger, PaymentReconciler, ReservationManager, RetryPolicy,
};
use seatwise_catalog::{CatalogService, PricingConfig, PricingEngine};
use seatwise_core::{BookingRepository, SeatLedger, TransactionRepository};
use seatwise_store::app_config::BusinessRules;
use seatwise_store::{BroadcastPublisher, MemoryStore};

use crate::metrics::Metrics;

/// Storage and ledger handles the service runs against.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn CatalogService>,
    pub ledger: Arc<dyn SeatLedger>,
    pub bookings: Arc<dyn BookingRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
}

impl Backends {
    /// Everything in process memory except the given catalog.
    pub fn in_memory(catalog: Arc<dyn CatalogService>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            catalog,
            ledger: Arc::new(InMemorySeatLedger::new()),
            bookings: store.clone(),
            transactions: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ReservationManager>,
    pub reconciler: Arc<PaymentReconciler>,
    pub catalog: Arc<dyn CatalogService>,
    pub publisher: BroadcastPublisher,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        backends: &Backends,
        rules: &BusinessRules,
        publisher: BroadcastPublisher,
        metrics: Arc<Metrics>,
    ) -> Self {
        let events = Arc::new(publisher.clone());
        let pricing = PricingEngine::new(PricingConfig {
            seat_type_weights: rules.seat_type_weights.clone(),
        });

        let manager = ReservationManager::new(
            backends.catalog.clone(),
            backends.ledger.clone(),
            backends.bookings.clone(),
            backends.transactions.clone(),
            events.clone(),
            pricing,
            booking_rules(rules),
        );
        let reconciler = PaymentReconciler::new(
            backends.ledger.clone(),
            backends.bookings.clone(),
            backends.transactions.clone(),
            events,
        );

        Self {
            manager: Arc::new(manager),
            reconciler: Arc::new(reconciler),
            catalog: backends.catalog.clone(),
            publisher,
            metrics,
        }
    }
}

pub fn booking_rules(rules: &BusinessRules) -> BookingRules {
    let defaults = BookingRules::default();
    let hold_duration = i64::try_from(rules.hold_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .filter(|hold| *hold > chrono::Duration::zero() && *hold <= chrono::Duration::days(1))
        .unwrap_or_else(|| {
            warn!(hold_seconds = rules.hold_seconds, "Ignoring out-of-range hold duration");
            defaults.hold_duration
        });

    BookingRules {
        hold_duration,
        currency: rules.currency.clone(),
        release_retry: retry_policy(rules),
    }
}

fn retry_policy(rules: &BusinessRules) -> RetryPolicy {
    RetryPolicy {
        attempts: rules.release_retries.max(1),
        ..RetryPolicy::default()
    }
}

pub fn expiry_sweeper(backends: &Backends, rules: &BusinessRules, publisher: &BroadcastPublisher) -> ExpirySweeper {
    ExpirySweeper::new(
        backends.ledger.clone(),
        backends.bookings.clone(),
        Arc::new(publisher.clone()),
        retry_policy(rules),
    )
}
