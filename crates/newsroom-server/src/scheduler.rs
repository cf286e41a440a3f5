//! Background job scheduler.
//!
//! Registers the research sweep: on every tick, publications whose last run
//! is older than the staleness window (and that have an active source) get a
//! background research run unless one is already in flight.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runner::{spawn_run, ResearchRunner};

/// Outcome of one sweep tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub due: usize,
    pub dispatched: usize,
    pub already_running: usize,
}

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// sweep cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<newsroom_core::AppConfig>,
    runner: Arc<ResearchRunner>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_sweep_job(&scheduler, pool, &config, runner).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_sweep_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: &newsroom_core::AppConfig,
    runner: Arc<ResearchRunner>,
) -> Result<(), JobSchedulerError> {
    let cron = config.sweep_cron.clone();
    let staleness_hours = config.research_staleness_hours;
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let runner = Arc::clone(&runner);

        Box::pin(async move {
            tracing::info!("scheduler: starting research sweep");
            let summary = run_sweep(&pool, &runner, staleness_hours).await;
            tracing::info!(
                due = summary.due,
                dispatched = summary.dispatched,
                already_running = summary.already_running,
                "scheduler: research sweep complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, staleness_hours, "scheduler: registered research sweep");
    Ok(())
}

/// Cutoff before which a publication's last run counts as stale.
#[must_use]
pub fn stale_before(now: DateTime<Utc>, staleness_hours: i64) -> DateTime<Utc> {
    now - TimeDelta::hours(staleness_hours)
}

/// Dispatch a research run for every publication due now.
async fn run_sweep(pool: &PgPool, runner: &Arc<ResearchRunner>, staleness_hours: i64) -> SweepSummary {
    let cutoff = stale_before(Utc::now(), staleness_hours);
    let due = match newsroom_db::list_publications_due_for_research(pool, cutoff).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list publications due for research");
            return SweepSummary::default();
        }
    };

    dispatch(runner, due.iter().map(|p| p.id))
}

fn dispatch(runner: &Arc<ResearchRunner>, publication_ids: impl Iterator<Item = i64>) -> SweepSummary {
    let mut summary = SweepSummary::default();
    for publication_id in publication_ids {
        summary.due += 1;
        match runner.try_claim(publication_id) {
            Some(claim) => {
                spawn_run(claim, "sweep");
                summary.dispatched += 1;
            }
            None => {
                tracing::debug!(publication_id, "scheduler: research already in flight; skipping");
                summary.already_running += 1;
            }
        }
    }
    summary
}
