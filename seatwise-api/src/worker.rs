use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use seatwise_booking::ExpirySweeper;

use crate::metrics::Metrics;

/// Run the expiry sweeper until shutdown, feeding every report into metrics.
pub async fn start_expiry_worker(
    sweeper: ExpirySweeper,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    metrics: Arc<Metrics>,
) {
    info!("Expiry worker starting");
    sweeper
        .run(interval, shutdown, move |report| metrics.record_sweep(report))
        .await;
}
