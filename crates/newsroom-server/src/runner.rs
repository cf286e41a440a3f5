//! Shared entry point for research runs started by the sweep or the API.
//!
//! A publication is claimed before its run starts and released when the
//! claim drops, so the same publication never runs twice at once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use newsroom_research::{retry_with_backoff, ResearchEngine, ResearchError, RunStats};

pub struct ResearchRunner {
    engine: Arc<ResearchEngine>,
    in_flight: Mutex<HashSet<i64>>,
    max_retries: u32,
    retry_delay: Duration,
}

/// Exclusive right to research one publication. Released on drop.
pub struct RunClaim {
    runner: Arc<ResearchRunner>,
    publication_id: i64,
}

impl ResearchRunner {
    #[must_use]
    pub fn new(engine: Arc<ResearchEngine>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            engine,
            in_flight: Mutex::new(HashSet::new()),
            max_retries,
            retry_delay,
        }
    }

    /// Claim `publication_id`, or `None` if a run is already in flight.
    #[must_use]
    pub fn try_claim(self: &Arc<Self>, publication_id: i64) -> Option<RunClaim> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(publication_id);

        inserted.then(|| RunClaim {
            runner: Arc::clone(self),
            publication_id,
        })
    }

    fn release(&self, publication_id: i64) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&publication_id);
    }
}

impl RunClaim {
    #[must_use]
    pub fn publication_id(&self) -> i64 {
        self.publication_id
    }

    /// Run research for the claimed publication, retrying transient failures
    /// with back-off. The claim is held until the final attempt finishes.
    ///
    /// # Errors
    ///
    /// Returns the last [`ResearchError`] once retries are exhausted.
    pub async fn run(self) -> Result<RunStats, ResearchError> {
        let engine: &ResearchEngine = &self.runner.engine;
        let publication_id = self.publication_id;
        let delay_ms = u64::try_from(self.runner.retry_delay.as_millis()).unwrap_or(u64::MAX);

        retry_with_backoff(self.runner.max_retries, delay_ms, move || {
            engine.research_publication(publication_id)
        })
        .await
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.runner.release(self.publication_id);
    }
}

/// Spawn a claimed run in the background and log its outcome.
pub fn spawn_run(claim: RunClaim, trigger: &'static str) {
    tokio::spawn(async move {
        let publication_id = claim.publication_id();
        tracing::info!(publication_id, trigger, "research run started");
        match claim.run().await {
            Ok(stats) => tracing::info!(
                publication_id,
                trigger,
                new_candidates = stats.new_candidates,
                skipped_duplicates = stats.skipped_duplicates,
                errors = stats.errors,
                "research run complete"
            ),
            Err(e) => tracing::error!(
                publication_id,
                trigger,
                error = %e,
                "research run failed"
            ),
        }
    });
}
