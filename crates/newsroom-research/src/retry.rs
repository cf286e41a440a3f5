//! Back-off policy for whole research runs.
//!
//! A run that fails on a store outage, a transport error, or a 5xx from an
//! upstream service is repeated. A missing publication or bad configuration
//! is returned at once (see [`ResearchError::is_retriable`]).

use std::future::Future;
use std::time::Duration;

use crate::error::ResearchError;

const MAX_DELAY_MS: u64 = 60_000;

/// Delay before retry number `retry` (1-based): `base_ms` doubled per
/// earlier retry, capped at one minute, scaled by a jitter factor in
/// `0.75..1.25`.
fn backoff_delay(retry: u32, base_ms: u64) -> Duration {
    let exponent = retry.saturating_sub(1).min(10);
    let ceiling = base_ms.saturating_mul(1u64 << exponent).min(MAX_DELAY_MS);
    let jitter = 0.75 + rand::random::<f64>() * 0.5;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let millis = (ceiling as f64 * jitter) as u64;
    Duration::from_millis(millis)
}

/// Run `operation`, retrying transient failures up to `max_retries` times.
///
/// # Errors
///
/// The first non-retriable error, or the last error once retries run out.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ResearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResearchError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() && retries < max_retries => err,
            Err(err) => return Err(err),
        };
        retries += 1;
        let delay = backoff_delay(retries, backoff_base_ms);
        tracing::warn!(
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "research run failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
