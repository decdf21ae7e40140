//! Small, testable retry helpers (see REDESIGN FLAGS in SPEC_FULL.md — the
//! source's retry loops were ad hoc per-call-site counters; here they're
//! shared functions parameterized by attempt count and interval, used by
//! both the transfer and assembly paths).

use std::future::Future;
use std::time::{Duration, Instant};

/// Retry `attempt` up to `max_attempts` times, sleeping `backoff` between
/// tries. Returns the first `Ok`, or the last `Err` once attempts are
/// exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut attempt: F,
    max_attempts: usize,
    backoff: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for i in 0..max_attempts.max(1) {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if i + 1 < max_attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(last_err.expect("max_attempts >= 1 guarantees at least one attempt"))
}

/// Retry `attempt` until it succeeds or `window` has elapsed since the first
/// try, sleeping `backoff` between tries. Used for manifest delivery, which
/// is bounded by a total retry window rather than a fixed attempt count.
pub async fn retry_for_duration<F, Fut, T, E>(
    mut attempt: F,
    window: Duration,
    backoff: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + window;
    let mut last_err = None;
    loop {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if Instant::now() >= deadline {
                    return Err(last_err.unwrap());
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
