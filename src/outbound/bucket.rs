//! Token bucket pacing one connection's outbound traffic.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Fractional token bucket.
///
/// Holds at most `capacity` tokens and refills continuously at
/// `refill_per_second`. A refill attempt closer than `min_interval` to the
/// previous one is skipped so rapid polling does not accumulate rounding
/// error. Callers pass the current instant, which keeps the bucket
/// deterministic under test.
#[derive(Debug, Clone)]
pub struct RateBucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    min_interval: Duration,
    last_refill: Instant,
}

impl RateBucket {
    /// A full bucket.
    pub fn new(capacity: f64, refill_per_second: f64, min_interval: Duration, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_second,
            min_interval,
            last_refill: now,
        }
    }

    pub fn from_config(config: &RateLimitConfig, now: Instant) -> Self {
        Self::new(
            config.capacity,
            config.refill_per_second,
            config.min_refill_interval(),
            now,
        )
    }

    /// Add the tokens earned since the last refill, capped at capacity.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed < self.min_interval {
            return;
        }
        let earned = elapsed.as_secs_f64() * self.refill_per_second;
        self.tokens = (self.tokens + earned).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then take one token if a whole token is available.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated time until a whole token is available.
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 || self.refill_per_second <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_second)
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
