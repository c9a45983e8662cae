use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use seatwise_booking::SweepReport;

pub struct Metrics {
    pub registry: Registry,
    pub bookings_created: IntCounter,
    pub seat_conflicts: IntCounter,
    pub bookings_expired: IntCounter,
    pub holds_reconciled: IntCounter,
    pub sweep_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new("seatwise_bookings_created_total", "Bookings placed on hold")?;
        let seat_conflicts = IntCounter::new(
            "seatwise_seat_conflicts_total",
            "Booking requests rejected because a seat was taken",
        )?;
        let bookings_expired = IntCounter::new("seatwise_bookings_expired_total", "Unpaid bookings expired by the sweeper")?;
        let holds_reconciled = IntCounter::new(
            "seatwise_holds_reconciled_total",
            "Orphaned or stale seat holds repaired by the sweeper",
        )?;
        let sweep_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "seatwise_sweep_duration_seconds",
            "Wall time of one expiry sweep",
        ))?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(seat_conflicts.clone()))?;
        registry.register(Box::new(bookings_expired.clone()))?;
        registry.register(Box::new(holds_reconciled.clone()))?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            seat_conflicts,
            bookings_expired,
            holds_reconciled,
            sweep_duration_seconds,
        })
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.bookings_expired.inc_by(report.expired as u64);
        self.holds_reconciled
            .inc_by((report.orphans_released + report.holds_reconfirmed) as u64);
        self.sweep_duration_seconds.observe(report.elapsed.as_secs_f64());
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report_is_counted() {
        let metrics = Metrics::new().unwrap();
        metrics.record_sweep(&SweepReport {
            expired: 2,
            orphans_released: 1,
            holds_reconfirmed: 1,
            ..SweepReport::default()
        });

        assert_eq!(metrics.bookings_expired.get(), 2);
        assert_eq!(metrics.holds_reconciled.get(), 2);
        assert_eq!(metrics.sweep_duration_seconds.get_sample_count(), 1);
        assert!(metrics.render().unwrap().contains("seatwise_bookings_expired_total 2"));
    }
}
