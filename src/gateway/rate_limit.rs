//! Fixed-window request limiter keyed by client address and route class.
//!
//! Authentication endpoints get a much lower ceiling than proxied traffic,
//! since credential guessing concentrates there. Classes never share a bucket,
//! so exhausting the auth budget leaves the general budget untouched.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::config::RatePolicy;

// Sweep stale buckets at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    General,
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct RateBucket {
    window_start: Instant,
    count: u32,
}

#[derive(Debug)]
struct Buckets {
    entries: HashMap<(String, RateClass), RateBucket>,
    last_sweep: Instant,
}

/// Counts requests per client key and route class.
///
/// [`FixedWindowLimiter`] is the in-process implementation; a shared store can
/// stand behind the same trait when several gateway instances share budgets.
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` in `class` and decide whether it may proceed.
    fn check(&self, key: &str, class: RateClass) -> RateDecision;
}

/// Limiter that never denies.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _class: RateClass) -> RateDecision {
        RateDecision::Allow
    }
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    general: RatePolicy,
    auth: RatePolicy,
    buckets: Mutex<Buckets>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(general: RatePolicy, auth: RatePolicy) -> Self {
        Self {
            general,
            auth,
            buckets: Mutex::new(Buckets {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    fn policy(&self, class: RateClass) -> RatePolicy {
        match class {
            RateClass::General => self.general,
            RateClass::Auth => self.auth,
        }
    }

    pub(crate) fn check_at(&self, key: &str, class: RateClass, now: Instant) -> RateDecision {
        let policy = self.policy(class);

        // Increment-and-check happens under a single lock acquisition.
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.sweep(now, self.general.window.max(self.auth.window));

        let bucket = buckets
            .entries
            .entry((key.to_string(), class))
            .or_insert(RateBucket {
                window_start: now,
                count: 0,
            });

        if now.duration_since(bucket.window_start) >= policy.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= policy.max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            return RateDecision::Deny {
                retry_after: policy.window.saturating_sub(elapsed),
            };
        }

        bucket.count += 1;
        RateDecision::Allow
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str, class: RateClass) -> RateDecision {
        self.check_at(key, class, Instant::now())
    }
}

impl Buckets {
    fn sweep(&mut self, now: Instant, longest_window: Duration) {
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.entries
            .retain(|_, bucket| now.duration_since(bucket.window_start) < longest_window);
        self.last_sweep = now;
    }
}
