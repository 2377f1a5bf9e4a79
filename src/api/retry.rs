use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::warn;

/// Run `op` up to `max_attempts` times with a fixed `delay` between
/// attempts, retrying only while `retryable` says the error is worth it.
/// The last error is re-raised after exhaustion.
pub async fn retry<T, E, Fut, Op, P>(
    mut op: Op,
    retryable: P,
    max_attempts: u32,
    delay: Duration,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && retryable(&err) => {
                warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, attempts, err, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("the final attempt either returned or re-raised")
}
