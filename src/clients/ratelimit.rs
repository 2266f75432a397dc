//! A process-wide token bucket per rate-limited client (§5: "Rate-limit
//! state for a registry client is a token bucket or equivalent; concurrent
//! clients serialize on it").

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }
}

/// A token bucket behind a mutex; `take()` blocks (via short sleeps) until
/// a token is available rather than failing the caller outright.
pub struct TokenBucket {
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        TokenBucket {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                capacity,
                refill_per_second,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks the calling thread until one token is available, then spends it.
    pub fn take(&self) {
        loop {
            {
                let mut bucket = self.bucket.lock().expect("ratelimit mutex poisoned");
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Exponential backoff with a ceiling, used once rate-limit headers report
/// exhaustion. Returns the sequence of delays a caller should sleep through
/// between retries, capped at `ceiling`.
pub struct Backoff {
    attempt: u32,
    base: Duration,
    ceiling: Duration,
}

impl Backoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Backoff {
            attempt: 0,
            base,
            ceiling,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        self.attempt += 1;
        (self.base.saturating_mul(factor)).min(self.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_exhausts_then_refills() {
        let bucket = TokenBucket::new(1.0, 1000.0);
        bucket.take();
        // Refill rate is fast enough that a second take() returns promptly.
        bucket.take();
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second >= first);
        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_secs(1));
        }
    }
}
