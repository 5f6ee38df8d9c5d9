//! Environment configuration, `TURFBOOK_*` prefixed.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the WAL.
    pub data_dir: PathBuf,
    /// Path to the resource-catalog JSON blob.
    pub catalog_path: PathBuf,
    /// Shared secret for gateway signature verification.
    pub gateway_secret: String,
    pub currency: String,
    /// Business timezone, minutes east of UTC.
    pub utc_offset_minutes: i32,
    /// How far ahead online bookings may be placed.
    pub booking_window_days: u32,
    /// Reap pending/processing reservations older than this. `None` disables
    /// the sweep and preserves indefinite abandoned carts.
    pub stale_after_minutes: Option<u64>,
    /// Prometheus exporter port. `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("TURFBOOK_DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            catalog_path: std::env::var("TURFBOOK_CATALOG")
                .unwrap_or_else(|_| "./catalog.json".into())
                .into(),
            gateway_secret: std::env::var("TURFBOOK_GATEWAY_SECRET").unwrap_or_default(),
            currency: std::env::var("TURFBOOK_CURRENCY").unwrap_or_else(|_| "INR".into()),
            utc_offset_minutes: env_parse("TURFBOOK_UTC_OFFSET_MINUTES").unwrap_or(330),
            booking_window_days: env_parse("TURFBOOK_BOOKING_WINDOW_DAYS").unwrap_or(30),
            stale_after_minutes: env_parse("TURFBOOK_STALE_AFTER_MINUTES"),
            metrics_port: env_parse("TURFBOOK_METRICS_PORT"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}
