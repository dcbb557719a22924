//! Rate limiting for authentication endpoints
//!
//! Sliding-window counters kept in memory:
//! - failed logins per email (5 per 15 minutes)
//! - auth requests per IP address (10 per minute)
//! - verification codes sent per email (3 per 10 minutes)
//! - wrong verification codes per email (5 per 10 minutes)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Timestamps of recent events per key, forgotten after `window`
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        let times = events.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= self.limit
    }

    async fn record(&self, key: K) {
        self.events.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self) {
        let cutoff = Utc::now() - self.window;
        self.events.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

/// Limits for login, registration and verification-code requests
pub struct AuthRateLimiter {
    failed_logins: SlidingWindow<String>,
    ip_requests: SlidingWindow<IpAddr>,
    code_sends: SlidingWindow<String>,
    code_failures: SlidingWindow<String>,
}

impl AuthRateLimiter {
    pub fn new() -> Self {
        Self {
            failed_logins: SlidingWindow::new(5, Duration::minutes(15)),
            ip_requests: SlidingWindow::new(10, Duration::minutes(1)),
            code_sends: SlidingWindow::new(3, Duration::minutes(10)),
            code_failures: SlidingWindow::new(5, Duration::minutes(10)),
        }
    }

    /// Check if an email has too many recent failed logins
    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.failed_logins.is_limited(email.to_lowercase()).await
    }

    pub async fn record_failed_login(&self, email: &str) {
        self.failed_logins.record(email.to_lowercase()).await;
    }

    /// Forget failed attempts after a successful login
    pub async fn clear_failed_logins(&self, email: &str) {
        self.failed_logins.clear(&email.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ip_requests.is_limited(ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ip_requests.record(ip).await;
    }

    /// Check whether another verification code may be sent to `email`,
    /// counting this send if it may.
    pub async fn try_send_code(&self, email: &str) -> bool {
        let key = email.to_lowercase();
        if self.code_sends.is_limited(key.clone()).await {
            return false;
        }
        self.code_sends.record(key).await;
        true
    }

    /// Whether `email` has used up its wrong-code guesses for now
    pub async fn is_code_check_limited(&self, email: &str) -> bool {
        self.code_failures.is_limited(email.to_lowercase()).await
    }

    pub async fn record_failed_code(&self, email: &str) {
        self.code_failures.record(email.to_lowercase()).await;
    }

    pub async fn clear_failed_codes(&self, email: &str) {
        self.code_failures.clear(&email.to_lowercase()).await;
    }

    /// Drop expired entries (called periodically)
    pub async fn cleanup(&self) {
        self.failed_logins.prune().await;
        self.ip_requests.prune().await;
        self.code_sends.prune().await;
        self.code_failures.prune().await;
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
