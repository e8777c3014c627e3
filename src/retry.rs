//! Exponential backoff with jitter around a fallible async operation.
//! Delay for attempt n is `base_delay * 2^(n-1) * uniform(1-jitter,
//! 1+jitter)`, with a caller-supplied classifier distinguishing
//! retryable, fatal, and empty-but-successful outcomes.

use std::future::Future;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::errors::{Classification, IngestError};

/// Runs `op` until it succeeds, exhausts `max_attempts`, or `classify`
/// reports a fatal/empty outcome.
///
/// `op` returns `Result<T, IngestError>`; on `Err`, `classify` is consulted.
/// `Classification::Retry` loops (sleeping first); `Fatal` propagates `op`'s
/// error immediately; `Empty` is surfaced as `Ok` so callers distinguish "no
/// data" from "failed" without inspecting the error type.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    mut op: F,
) -> Result<Option<T>, IngestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IngestError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(Some(value)),
            Err(err) => match err.classify() {
                Classification::Empty => {
                    debug!(attempt, "operation returned source_empty, not retrying");
                    return Ok(None);
                }
                Classification::Fatal => {
                    debug!(attempt, %err, "fatal error, aborting retry loop");
                    return Err(err);
                }
                Classification::Retry => {
                    if attempt >= config.max_attempts {
                        warn!(attempt, %err, "retry attempts exhausted");
                        return Err(IngestError::RetryExhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                    let delay = backoff_delay(config, attempt);
                    debug!(attempt, ?delay, %err, "retrying after backoff");
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> std::time::Duration {
    let exp = 2f64.powi(attempt as i32 - 1);
    let jitter_factor = rand::thread_rng().gen_range(1.0 - config.jitter..=1.0 + config.jitter);
    config.base_delay.mul_f64(exp * jitter_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let result = retry_with_backoff(&fast_config(3), || async { Ok::<_, IngestError>(42) })
            .await
            .unwrap();
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast_config(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(IngestError::TransientNetwork("timeout".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let err = retry_with_backoff(&fast_config(2), || async {
            Err::<i32, _>(IngestError::RateLimited)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::RetryExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn fatal_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(&fast_config(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(IngestError::NotImplemented) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::NotImplemented));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_sentinel_returns_ok_none() {
        let result = retry_with_backoff(&fast_config(3), || async {
            Err::<i32, _>(IngestError::SourceEmpty)
        })
        .await
        .unwrap();
        assert_eq!(result, None);
    }
}
