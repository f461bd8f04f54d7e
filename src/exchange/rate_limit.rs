// =============================================================================
// Rate limiter — single-client minimum inter-request spacing
// =============================================================================
//
// Records the instant of the last request and, before the next one, sleeps
// whatever is left of the minimum spacing. This is deliberately simpler than
// a token bucket: the upstream endpoints this client talks to do not publish
// weight headers, only an informal "don't hammer us" expectation.
// =============================================================================

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Block until at least `min_interval` has elapsed since the previous
    /// call to `wait`, then record this call's instant.
    pub async fn wait(&self) {
        let deficit = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let deficit = match *last {
                Some(prev) => {
                    let elapsed = now.duration_since(prev);
                    self.min_interval.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            *last = Some(now + deficit);
            deficit
        };

        if !deficit.is_zero() {
            tokio::time::sleep(deficit).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn back_to_back_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn well_spaced_calls_do_not_sleep() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
