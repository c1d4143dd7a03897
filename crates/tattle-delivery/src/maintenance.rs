//! Periodic housekeeping: audit-log retention.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tattle_db::WebhookLogEntry;
use tokio::task::JoinHandle;

use crate::config::DeliveryConfig;

/// Purge audit entries older than the configured retention. Returns the
/// number of rows removed.
pub async fn purge_expired_logs(
    pool: &PgPool,
    config: &DeliveryConfig,
) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - config.log_retention;
    let purged = WebhookLogEntry::purge_older_than(pool, cutoff).await?;
    if purged > 0 {
        tracing::info!(
            target: "tattle_maintenance",
            purged,
            %cutoff,
            "Purged expired webhook log entries"
        );
    }
    Ok(purged)
}

/// Spawn a task that purges expired entries on a fixed interval.
pub fn spawn_log_cleaner(
    pool: PgPool,
    config: DeliveryConfig,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired_logs(&pool, &config).await {
                tracing::error!(
                    target: "tattle_maintenance",
                    error = %e,
                    "Log purge failed"
                );
            }
        }
    })
}
