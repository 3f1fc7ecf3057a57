//! Retry with exponential back-off and jitter for media downloads.

use std::future::Future;
use std::time::Duration;

use crate::error::MediaError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:** timeouts, connection failures, HTTP 429 and 5xx.
///
/// **Not retriable:** 404 and other 4xx statuses, local I/O, budget errors.
pub(crate) fn is_retriable(err: &MediaError) -> bool {
    match err {
        MediaError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        MediaError::RateLimited { .. } => true,
        MediaError::UnexpectedStatus { status, .. } => *status >= 500,
        MediaError::NotFound { .. }
        | MediaError::Acquisition { .. }
        | MediaError::ResourceExhausted { .. }
        | MediaError::Io { .. }
        | MediaError::Decode { .. }
        | MediaError::ArbiterClosed => false,
    }
}

/// Delay schedule between download attempts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    base_ms: u64,
}

impl Backoff {
    const MAX_DELAY_MS: u64 = 60_000;

    pub(crate) fn new(base_ms: u64) -> Self {
        Self { base_ms }
    }

    /// Wait before retry number `retry` (1-based) after `err`.
    ///
    /// `jitter` in `[0, 1)` spreads the exponential step over ±25 %. A server
    /// `Retry-After` is a floor the jittered step never undercuts.
    pub(crate) fn delay(self, retry: u32, err: &MediaError, jitter: f64) -> Duration {
        let step = self
            .base_ms
            .saturating_mul(1u64 << retry.saturating_sub(1).min(10))
            .min(Self::MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jittered = Duration::from_millis((step as f64 * (0.75 + jitter * 0.5)) as u64);
        match err {
            MediaError::RateLimited {
                retry_after_secs, ..
            } => jittered.max(Duration::from_secs(*retry_after_secs)),
            _ => jittered,
        }
    }
}

/// Runs `operation`, retrying transient failures up to `max_retries` times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, MediaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MediaError>>,
{
    let backoff = Backoff::new(backoff_base_ms);
    for retry in 1..=max_retries {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retriable(&err) => err,
            Err(err) => return Err(err),
        };
        let delay = backoff.delay(retry, &err, rand::random::<f64>());
        tracing::warn!(
            retry,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient fetch error"
        );
        tokio::time::sleep(delay).await;
    }
    operation().await
}
