use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::gauge;
use tokio::task::JoinHandle;

use super::{Decision, LimiterKey, RateLimitPolicy};

/// Sliding-window admission counter keyed by [`LimiterKey`].
///
/// Each key holds the instants of its admissions inside the current
/// window. An admission made at `t` stops counting at exactly
/// `t + window`, so the cap holds over any window-sized interval, not
/// just aligned ones.
pub struct SlidingWindowLimiter {
    windows: DashMap<String, WindowLog>,
    whitelist: HashSet<IpAddr>,
}

struct WindowLog {
    admitted: VecDeque<Instant>,
    window: Duration,
}

impl WindowLog {
    fn new(window: Duration) -> Self {
        Self {
            admitted: VecDeque::new(),
            window,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            whitelist: HashSet::new(),
        }
    }

    /// Addresses that are never denied and never counted.
    pub fn with_whitelist(whitelist: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            windows: DashMap::new(),
            whitelist: whitelist.into_iter().collect(),
        }
    }

    pub fn is_whitelisted(&self, ip: IpAddr) -> bool {
        self.whitelist.contains(&ip)
    }

    /// Decide one admission for `key` under `policy`.
    ///
    /// The count-and-admit step runs under the key's entry guard, so two
    /// concurrent calls for the same key cannot both take the last slot.
    pub fn check(&self, key: &LimiterKey, policy: RateLimitPolicy) -> Decision {
        if key.ip().is_some_and(|ip| self.is_whitelisted(ip)) {
            return Decision::allowed(policy.max_requests, policy.max_requests);
        }
        if policy.max_requests == 0 {
            return Decision::denied(0, policy.window);
        }

        let now = Instant::now();
        let mut log = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowLog::new(policy.window));
        log.window = policy.window;
        log.prune(now);

        if log.admitted.len() < policy.max_requests as usize {
            log.admitted.push_back(now);
            let remaining = policy.max_requests - log.admitted.len() as u32;
            return Decision::allowed(policy.max_requests, remaining);
        }

        // Full window. A slot frees when the oldest admission ages out.
        let oldest = log.admitted.front().copied().unwrap_or(now);
        let retry_after = policy.window.saturating_sub(now.duration_since(oldest));
        Decision::denied(policy.max_requests, retry_after)
    }

    /// Report the current quota for `key` without consuming anything.
    pub fn peek(&self, key: &LimiterKey, policy: RateLimitPolicy) -> Decision {
        if key.ip().is_some_and(|ip| self.is_whitelisted(ip)) {
            return Decision::allowed(policy.max_requests, policy.max_requests);
        }

        let now = Instant::now();
        let Some(mut log) = self.windows.get_mut(&key.to_string()) else {
            return Decision::allowed(policy.max_requests, policy.max_requests);
        };
        log.prune(now);

        let used = log.admitted.len() as u32;
        let remaining = policy.max_requests.saturating_sub(used);
        let retry_after = log
            .admitted
            .front()
            .map(|oldest| policy.window.saturating_sub(now.duration_since(*oldest)));
        Decision {
            allowed: remaining > 0,
            limit: policy.max_requests,
            remaining,
            retry_after,
        }
    }

    /// Forget everything counted against `key`. Returns whether the key
    /// had state to clear.
    pub fn reset(&self, key: &LimiterKey) -> bool {
        self.windows.remove(&key.to_string()).is_some()
    }

    /// Drop keys whose newest admission has aged out of its window.
    /// Returns how many keys were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, log| {
            log.admitted
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < log.window)
        });
        before - self.windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically sweep idle keys so the limiter's memory tracks active
/// clients rather than every client ever seen.
pub fn spawn_sweeper(limiter: Arc<SlidingWindowLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let dropped = limiter.sweep();
            gauge!("rate_limiter_tracked_keys").set(limiter.tracked_keys() as f64);
            if dropped > 0 {
                tracing::debug!(dropped, "Swept idle rate limiter keys");
            }
        }
    })
}
