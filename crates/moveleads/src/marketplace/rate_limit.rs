//! Per-client throttle on lead submissions.
//!
//! A sliding window of accepted submission times is kept per client key (normally the
//! caller's address). The limiter is an ordinary value constructed at startup and shared
//! through the intake service, so each test and each process instance owns its own state.
//!
//! Keys are caller supplied, so the number of tracked keys is capped. A new key arriving at
//! the cap forces a cleanup; if no window has expired the submission is refused.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::MarketplaceConfig;

const CLEANUP_EVERY: u64 = 256;
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_submissions: u32,
    pub window: Duration,
    pub max_tracked_keys: usize,
}

impl RateLimitPolicy {
    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self {
            max_submissions: config.submissions_per_window,
            window: config.submission_window,
            max_tracked_keys: config.max_tracked_clients,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_submissions: 5,
            window: Duration::from_secs(3600),
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many submissions, retry in {retry_after_secs}s")]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

#[derive(Debug)]
pub struct SubmissionRateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    checks: AtomicU64,
}

impl SubmissionRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
            checks: AtomicU64::new(0),
        }
    }

    /// Record a submission for `key` at `now`, or refuse it when the window is full.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Result<(), RateLimited> {
        let window = chrono::Duration::from_std(self.policy.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
        let cutoff = now - window;

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if self.checks.fetch_add(1, Ordering::Relaxed) % CLEANUP_EVERY == CLEANUP_EVERY - 1 {
            remove_expired(&mut windows, cutoff);
        }

        if !windows.contains_key(key) && windows.len() >= self.policy.max_tracked_keys {
            remove_expired(&mut windows, cutoff);
            if windows.len() >= self.policy.max_tracked_keys {
                warn!(
                    client = key,
                    tracked = windows.len(),
                    max = self.policy.max_tracked_keys,
                    "lead submission refused, too many clients tracked"
                );
                return Err(RateLimited {
                    retry_after_secs: self.policy.window.as_secs().max(1),
                });
            }
        }

        let hits = windows.entry(key.to_string()).or_default();
        while hits.front().is_some_and(|at| *at <= cutoff) {
            hits.pop_front();
        }

        if hits.len() >= self.policy.max_submissions as usize {
            let retry_after_secs = hits
                .front()
                .map(|oldest| (*oldest + window - now).num_seconds().max(1))
                .unwrap_or(1) as u64;
            warn!(
                client = key,
                submissions = hits.len(),
                max = self.policy.max_submissions,
                "lead submission rate limit exceeded"
            );
            return Err(RateLimited { retry_after_secs });
        }

        hits.push_back(now);
        Ok(())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn remove_expired(windows: &mut HashMap<String, VecDeque<DateTime<Utc>>>, cutoff: DateTime<Utc>) {
    let before = windows.len();
    windows.retain(|_, hits| hits.back().is_some_and(|latest| *latest > cutoff));
    debug!(
        removed = before - windows.len(),
        tracked = windows.len(),
        "rate limiter cleanup"
    );
}

impl Default for SubmissionRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
