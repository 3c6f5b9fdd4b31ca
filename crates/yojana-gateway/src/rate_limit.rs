use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Result of charging one request to a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Admitted; `remaining` whole requests are left in the burst.
    Allowed { remaining: u32 },
    /// Refused until at least `retry_after` has passed.
    Limited { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Tokens left for one client as of `at`.
#[derive(Debug, Clone, Copy)]
struct Allowance {
    tokens: f64,
    at: Instant,
}

/// Per-client token buckets: up to `burst` requests at once, refilled at
/// `per_second`.
///
/// A client whose bucket has refilled completely is indistinguishable from
/// one never seen, so [`RateLimiter::prune`] can forget it.
pub struct RateLimiter {
    burst: f64,
    per_second: f64,
    clients: Mutex<HashMap<String, Allowance>>,
}

impl RateLimiter {
    pub fn new(burst: f64, per_second: f64) -> Self {
        Self {
            burst: burst.max(1.0),
            per_second: per_second.max(f64::MIN_POSITIVE),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn refilled(&self, allowance: Allowance, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(allowance.at).as_secs_f64();
        (allowance.tokens + elapsed * self.per_second).min(self.burst)
    }

    /// Charge one request to `client`.
    pub async fn admit(&self, client: &str) -> Admission {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let tokens = match clients.get(client) {
            Some(allowance) => self.refilled(*allowance, now),
            None => self.burst,
        };

        if tokens < 1.0 {
            clients.insert(client.to_string(), Allowance { tokens, at: now });
            let wait = (1.0 - tokens) / self.per_second;
            return Admission::Limited {
                retry_after: Duration::from_secs_f64(wait.min(u32::MAX as f64)),
            };
        }

        let left = tokens - 1.0;
        clients.insert(client.to_string(), Allowance { tokens: left, at: now });
        Admission::Allowed {
            remaining: left.floor() as u32,
        }
    }

    /// Shorthand for `admit(client).await.is_allowed()`.
    pub async fn check(&self, client: &str) -> bool {
        self.admit(client).await.is_allowed()
    }

    /// Forget clients whose bucket is full again. Returns how many were dropped.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, allowance| self.refilled(*allowance, now) < self.burst);
        before - clients.len()
    }

    /// Number of clients currently tracked.
    pub async fn tracked(&self) -> usize {
        self.clients.lock().await.len()
    }
}
