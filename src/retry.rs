//! Generic retry and wait helpers.
//!
//! `retry` wraps any fallible async operation with a caller-supplied
//! policy. The policy is called with the number of retries already made
//! and the last error, and returns how long to wait before the next
//! attempt, or `None` to give up and surface that error.

use std::future::Future;
use std::time::Duration;

/// Sleep for `duration`. Dropping the future cancels the wait.
pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Run `operation` until it succeeds or `policy` declines another attempt.
pub async fn retry<T, E, F, Fut, P>(mut operation: F, mut policy: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(u32, &E) -> Option<Duration>,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match policy(retries, &error) {
                Some(delay) => {
                    tracing::debug!(retries, delay_ms = delay.as_millis() as u64, "retrying");
                    wait(delay).await;
                    retries += 1;
                }
                None => return Err(error),
            },
        }
    }
}

/// Same delay before every retry, at most `max_retries` times
pub fn fixed<E>(delay: Duration, max_retries: u32) -> impl FnMut(u32, &E) -> Option<Duration> {
    move |retries, _| (retries < max_retries).then_some(delay)
}

/// Delay growing by `step` with each retry
pub fn linear<E>(step: Duration, max_retries: u32) -> impl FnMut(u32, &E) -> Option<Duration> {
    move |retries, _| (retries < max_retries).then(|| step * (retries + 1))
}

/// Delay doubling with each retry, starting at `base`
pub fn exponential<E>(base: Duration, max_retries: u32) -> impl FnMut(u32, &E) -> Option<Duration> {
    move |retries, _| (retries < max_retries).then(|| base * 2u32.saturating_pow(retries))
}
