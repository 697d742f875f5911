use crate::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Exponential backoff with up to 250ms of jitter, capped at `max_ms`.
pub fn next_retry_delay(attempt: usize, base_ms: u64, max_ms: u64) -> Duration {
    let multiplier = 2_u64.saturating_pow(attempt as u32);
    let delay = base_ms.saturating_mul(multiplier);
    let jitter = rand::random::<u64>() % 250;
    Duration::from_millis(delay.saturating_add(jitter).min(max_ms))
}

/// Execute an async operation with retries.
pub async fn retry_async<T, E, F, Fut>(
    operation_name: &str,
    settings: RetrySettings,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_async_if(operation_name, settings, operation, |_| true).await
}

/// Like [`retry_async`], but gives up immediately on errors `should_retry` rejects.
pub async fn retry_async_if<T, E, F, Fut, P>(
    operation_name: &str,
    settings: RetrySettings,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = settings.max_attempts.max(1) as usize;
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if !should_retry(&e) {
                    return Err(e);
                }
                if attempt >= max_attempts {
                    error!(
                        target: "errors",
                        operation = operation_name,
                        attempts = max_attempts,
                        error = %e,
                        "Giving up after retries"
                    );
                    return Err(e);
                }
                let delay =
                    next_retry_delay(attempt, settings.base_delay_ms, settings.max_delay_ms);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
