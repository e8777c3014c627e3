//! Process-wide token-bucket rate limiter, one instance per source family.
//! A true bucket with `burst` capacity and a continuous refill rate, so a
//! caller can burst up to capacity rather than wait a strict minimum
//! interval between every single call.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A shared, cloneable handle to one source family's token bucket.
#[derive(Clone)]
pub struct RateLimiter {
    burst: f64,
    refill_per_sec: f64,
    state: Arc<Mutex<BucketState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            burst: config.burst as f64,
            refill_per_sec: config.refill_per_sec,
            state: Arc::new(Mutex::new(BucketState {
                tokens: config.burst as f64,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Blocks the caller until a token is available, then consumes one.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else if self.refill_per_sec > 0.0 {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                } else {
                    // No refill configured (burst-only); never blocks further
                    // once burst is exhausted for this process lifetime.
                    state.tokens = 1.0;
                    None
                }
            };
            match wait {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.burst);
            state.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    #[tokio::test(start_paused = true)]
    async fn bucket_allows_burst_then_throttles() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 2,
            refill_per_sec: 1.0,
        });

        // Two tokens available immediately.
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn rate_compliance_over_window() {
        // Property 6: over a sliding window the outbound request count never
        // exceeds the configured cap.
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 3,
            refill_per_sec: 3.0,
        });
        for _ in 0..3 {
            limiter.acquire().await;
        }
        let state = limiter.state.lock().await;
        assert!(state.tokens < 1.0);
    }
}
