//! Admission limiting.
//!
//! A [`SlidingWindowLimiter`] answers one question: may the caller behind
//! `key` perform one more request under `policy` right now? Policies bound
//! the number of admissions in any window of the configured length, not
//! per calendar interval, so a burst straddling an interval edge cannot
//! double its quota.

mod sliding;

pub use sliding::{spawn_sweeper, SlidingWindowLimiter};

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Cap on admissions per window for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    pub fn per_window_seconds(max_requests: u32, window_seconds: u64) -> Self {
        Self::new(max_requests, Duration::from_secs(window_seconds))
    }
}

/// What a limiter counts by. Keys render into disjoint namespaces so one
/// limiter instance can serve edge and per-route policies at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LimiterKey {
    /// Edge admission for one client address.
    Ip(IpAddr),
    /// Per-account admission, independent of where requests come from.
    Account(String),
    /// Per-route admission for an anonymous caller.
    RouteIp { route: String, ip: IpAddr },
    /// Per-route admission for an authenticated caller.
    RouteAccount { route: String, account_id: String },
}

impl LimiterKey {
    /// The client address this key counts by, when it counts by address.
    /// Whitelisting applies to exactly these keys.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            LimiterKey::Ip(ip) | LimiterKey::RouteIp { ip, .. } => Some(*ip),
            LimiterKey::Account(_) | LimiterKey::RouteAccount { .. } => None,
        }
    }
}

impl fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterKey::Ip(ip) => write!(f, "ip:{}", ip),
            LimiterKey::Account(id) => write!(f, "acct:{}", id),
            LimiterKey::RouteIp { route, ip } => write!(f, "route:{}:ip:{}", route, ip),
            LimiterKey::RouteAccount { route, account_id } => {
                write!(f, "route:{}:acct:{}", route, account_id)
            }
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// The policy cap, echoed back for response headers.
    pub limit: u32,
    /// Admissions left in the current window after this decision.
    pub remaining: u32,
    /// How long until a slot frees up. Set on denials.
    pub retry_after: Option<Duration>,
}

impl Decision {
    pub(crate) fn allowed(limit: u32, remaining: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            retry_after: None,
        }
    }

    pub(crate) fn denied(limit: u32, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }

    /// Retry-After in whole seconds, rounded up and never zero, since a
    /// zero would invite an immediate retry that is still denied.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after.map(|d| {
            let secs = if d.subsec_nanos() > 0 {
                d.as_secs() + 1
            } else {
                d.as_secs()
            };
            secs.max(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_into_disjoint_namespaces() {
        let ip: IpAddr = "10.0.0.7".parse().expect("ip");
        assert_eq!(LimiterKey::Ip(ip).to_string(), "ip:10.0.0.7");
        assert_eq!(
            LimiterKey::Account("42".to_string()).to_string(),
            "acct:42"
        );
        assert_eq!(
            LimiterKey::RouteIp {
                route: "POST /auth/login".to_string(),
                ip,
            }
            .to_string(),
            "route:POST /auth/login:ip:10.0.0.7"
        );
        assert_eq!(
            LimiterKey::RouteAccount {
                route: "PUT /accounts/me".to_string(),
                account_id: "42".to_string(),
            }
            .to_string(),
            "route:PUT /accounts/me:acct:42"
        );
    }

    #[test]
    fn only_address_keys_expose_an_ip() {
        let ip: IpAddr = "10.0.0.7".parse().expect("ip");
        assert_eq!(LimiterKey::Ip(ip).ip(), Some(ip));
        assert_eq!(
            LimiterKey::RouteIp {
                route: "r".to_string(),
                ip,
            }
            .ip(),
            Some(ip)
        );
        assert_eq!(LimiterKey::Account("42".to_string()).ip(), None);
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        let d = Decision::denied(10, Duration::from_millis(1_200));
        assert_eq!(d.retry_after_seconds(), Some(2));

        let d = Decision::denied(10, Duration::from_secs(3));
        assert_eq!(d.retry_after_seconds(), Some(3));

        // Sub-second waits still tell the client to hold off a full second.
        let d = Decision::denied(10, Duration::from_millis(20));
        assert_eq!(d.retry_after_seconds(), Some(1));

        let d = Decision::allowed(10, 4);
        assert_eq!(d.retry_after_seconds(), None);
    }
}
