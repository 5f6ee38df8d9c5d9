use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations created. Labels: channel.
pub const BOOKINGS_CREATED_TOTAL: &str = "turfbook_bookings_created_total";

/// Counter: creates rejected because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "turfbook_booking_conflicts_total";

/// Counter: payments confirmed as paid.
pub const PAYMENTS_CONFIRMED_TOTAL: &str = "turfbook_payments_confirmed_total";

/// Counter: payments recorded as failed (declines, user aborts, reaps).
pub const PAYMENTS_FAILED_TOTAL: &str = "turfbook_payments_failed_total";

/// Counter: confirmations rejected on signature mismatch.
pub const SIGNATURE_REJECTS_TOTAL: &str = "turfbook_signature_rejects_total";

/// Counter: stale reservations swept by the reaper.
pub const RESERVATIONS_REAPED_TOTAL: &str = "turfbook_reservations_reaped_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL append+fsync duration in seconds.
pub const WAL_APPEND_DURATION_SECONDS: &str = "turfbook_wal_append_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the fmt tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}
