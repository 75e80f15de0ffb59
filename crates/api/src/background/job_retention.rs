//! Periodic retention sweep over the job registry.
//!
//! Finished jobs older than the retention window are flagged
//! `cleanup_eligible`; nothing is deleted here. Runs on a fixed interval
//! using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chartcast_pipeline::registry::JobRegistry;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the retention sweep until `cancel` is triggered.
pub async fn run(registry: Arc<JobRegistry>, retention: Duration, cancel: CancellationToken) {
    let retention =
        chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::weeks(5200));

    tracing::info!(
        retention_secs = retention.num_seconds(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Job retention sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let marked = registry.mark_stale(retention, Utc::now()).await;
                if marked > 0 {
                    tracing::info!(marked, "Job retention: flagged jobs for cleanup");
                } else {
                    tracing::debug!("Job retention: nothing to flag");
                }
            }
        }
    }
}
