//! Research command handlers: one publication on demand, or a sweep over
//! every publication whose last run is stale.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use newsroom_research::{
    retry_with_backoff, CrawlRateLimiter, ResearchEngine, RunStats, TranscriptBreaker,
};

fn build_engine(
    pool: &sqlx::PgPool,
    config: &newsroom_core::AppConfig,
) -> anyhow::Result<ResearchEngine> {
    let limiter = Arc::new(CrawlRateLimiter::new(Duration::from_millis(
        config.crawl_min_interval_ms,
    )));
    Ok(ResearchEngine::from_config(
        pool.clone(),
        config,
        limiter,
        Arc::new(TranscriptBreaker::new()),
    )?)
}

async fn research_with_retry(
    engine: &ResearchEngine,
    config: &newsroom_core::AppConfig,
    publication_id: i64,
) -> Result<RunStats, newsroom_research::ResearchError> {
    retry_with_backoff(
        config.research_max_retries,
        config.research_retry_delay_secs.saturating_mul(1000),
        move || engine.research_publication(publication_id),
    )
    .await
}

/// Run discovery for one publication and print its run statistics.
///
/// # Errors
///
/// Returns an error if the engine cannot be built or the run fails after
/// retries.
pub(crate) async fn run_research(
    pool: &sqlx::PgPool,
    config: &newsroom_core::AppConfig,
    publication_id: i64,
) -> anyhow::Result<()> {
    let engine = build_engine(pool, config)?;
    let stats = research_with_retry(&engine, config, publication_id).await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Research every publication due for a run, one at a time.
///
/// With `dry_run` the due publications are listed and nothing runs. A failed
/// publication is logged and the sweep moves on.
///
/// # Errors
///
/// Returns an error if the due publications cannot be listed or the engine
/// cannot be built.
pub(crate) async fn run_sweep(
    pool: &sqlx::PgPool,
    config: &newsroom_core::AppConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let cutoff = Utc::now() - TimeDelta::hours(config.research_staleness_hours);
    let due = newsroom_db::list_publications_due_for_research(pool, cutoff).await?;

    if due.is_empty() {
        println!(
            "no publications due (staleness window {}h)",
            config.research_staleness_hours
        );
        return Ok(());
    }

    if dry_run {
        println!("{:<6}{:<24}LAST RUN", "ID", "SLUG");
        for publication in &due {
            let last_run = publication.last_research_run.map_or_else(
                || "never".to_string(),
                |t| t.format("%Y-%m-%d %H:%M").to_string(),
            );
            println!("{:<6}{:<24}{last_run}", publication.id, publication.slug);
        }
        return Ok(());
    }

    let engine = build_engine(pool, config)?;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut new_candidates = 0usize;

    for publication in &due {
        match research_with_retry(&engine, config, publication.id).await {
            Ok(stats) => {
                succeeded += 1;
                new_candidates += stats.new_candidates;
                tracing::info!(
                    publication_id = publication.id,
                    slug = %publication.slug,
                    new_candidates = stats.new_candidates,
                    errors = stats.errors,
                    "sweep: publication researched"
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(
                    publication_id = publication.id,
                    slug = %publication.slug,
                    error = %e,
                    "sweep: research failed"
                );
            }
        }
    }

    println!(
        "sweep complete: {succeeded} succeeded, {failed} failed, {new_candidates} new candidate(s)"
    );
    Ok(())
}
