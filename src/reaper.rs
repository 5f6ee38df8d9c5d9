use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::now_ms;
use crate::engine::Engine;
use crate::model::Ms;
use crate::observability;

/// Background task that fails reservations whose payment never concluded,
/// releasing their slots back to checkout.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration, stale_after: Duration) {
    let stale_after_ms = stale_after.as_millis() as Ms;
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let now = now_ms();
        let stale = engine.collect_stale(now, stale_after_ms);
        for id in stale {
            match engine.record_failure(id, "payment window expired").await {
                Ok(()) => {
                    metrics::counter!(observability::RESERVATIONS_REAPED_TOTAL).increment(1);
                    info!("reaped stale reservation {id}");
                }
                Err(e) => {
                    // Payment may have just settled — that's fine
                    tracing::debug!("reaper skip {id}: {e}");
                }
            }
        }
    }
}
