//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Currently a single job: purge expired sessions from the registry every
//! ten minutes. Expired sessions are already rejected on lookup, so the job
//! only keeps the registry from growing.

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::auth::SessionIssuer;

/// Every ten minutes, on the minute.
const SESSION_CLEANUP_SCHEDULE: &str = "0 */10 * * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(sessions: SessionIssuer) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cleanup_job = Job::new_async(SESSION_CLEANUP_SCHEDULE, move |_uuid, _lock| {
        let sessions = sessions.clone();
        Box::pin(async move {
            run_session_cleanup(&sessions).await;
        })
    })?;

    scheduler.add(cleanup_job).await?;
    scheduler.start().await?;

    tracing::info!("Scheduled tasks started");
    Ok(scheduler)
}

/// Remove expired sessions, logging rather than propagating failures.
pub async fn run_session_cleanup(sessions: &SessionIssuer) {
    match sessions.cleanup_expired().await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "expired sessions removed"),
        Err(e) => tracing::error!("Session cleanup task failed: {}", e),
    }
}
