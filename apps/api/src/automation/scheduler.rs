//! Background timers, built on tokio-cron-scheduler.
//!
//! - job sync every `sync_interval_minutes` (started and stopped by the admin API)
//! - hourly maintenance: expire unused OTPs, purge old read notifications

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::automation::system::JobAutomationSystem;
use crate::notifications;
use crate::otp::service::OtpService;

/// Read notifications older than this are deleted.
pub const NOTIFICATION_RETENTION_DAYS: i64 = 30;

/// Schedules the periodic sync. Holds only a weak handle so a stopped
/// system is not kept alive by its own timer.
pub async fn start_sync_scheduler(
    system: Weak<JobAutomationSystem>,
    interval_minutes: u64,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sync_job = Job::new_repeated_async(
        Duration::from_secs(interval_minutes.max(1) * 60),
        move |_uuid, _lock| {
            let system = system.clone();
            Box::pin(async move {
                let Some(system) = system.upgrade() else {
                    return;
                };
                if let Err(e) = system.perform_full_sync().await {
                    tracing::error!("Scheduled job sync failed: {e:?}");
                }
            })
        },
    )?;

    scheduler.add(sync_job).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Starts the hourly housekeeping jobs. Runs for the life of the process.
pub async fn start_maintenance_scheduler(pool: PgPool, otp: Arc<OtpService>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cleanup_job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = pool.clone();
        let otp = otp.clone();
        Box::pin(async move {
            if let Err(e) = run_maintenance(&pool, &otp).await {
                tracing::error!("Maintenance task failed: {e:?}");
            }
        })
    })?;

    scheduler.add(cleanup_job).await?;
    scheduler.start().await?;

    tracing::info!("Maintenance tasks scheduled (hourly OTP and notification cleanup)");
    Ok(scheduler)
}

async fn run_maintenance(pool: &PgPool, otp: &OtpService) -> Result<()> {
    otp.cleanup_expired().await?;

    let cutoff = Utc::now() - chrono::Duration::days(NOTIFICATION_RETENTION_DAYS);
    let deleted = notifications::delete_read_before(pool, cutoff).await?;
    if deleted > 0 {
        tracing::info!("Deleted {deleted} read notification(s) older than {NOTIFICATION_RETENTION_DAYS} days");
    }
    Ok(())
}
