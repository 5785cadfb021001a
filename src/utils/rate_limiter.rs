use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;

/// Fixed-window per-client request counter, keyed by IP. One instance per
/// enforced ceiling: the general API limit, the demo issuance ceiling and
/// the contact form window all get their own limiter.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, Window>>,
    max_requests: u32,
    window_duration: Duration,
}

#[derive(Debug)]
struct Window {
    window_start: Instant,
    request_count: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_duration: Duration) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            max_requests,
            window_duration,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn get_client_key(&self, addr: &SocketAddr) -> String {
        addr.ip().to_string()
    }

    pub fn check_rate_limit(&self, client_key: &str) -> bool {
        let now = Instant::now();

        let mut entry = self
            .buckets
            .entry(client_key.to_string())
            .or_insert(Window {
                window_start: now,
                request_count: 0,
            });

        // Reset window if it's expired
        if now.duration_since(entry.window_start) >= self.window_duration {
            entry.window_start = now;
            entry.request_count = 0;
        }

        if entry.request_count >= self.max_requests {
            return false;
        }

        entry.request_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_ceiling_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check_rate_limit("1.2.3.4"));
        }
        assert!(!limiter.check_rate_limit("1.2.3.4"));
        // Independent key is unaffected.
        assert!(limiter.check_rate_limit("5.6.7.8"));
    }

    #[test]
    fn window_reset_allows_requests_again() {
        let limiter = RateLimiter::new(1, Duration::from_millis(0));
        assert!(limiter.check_rate_limit("1.2.3.4"));
        // Zero-length window expires immediately.
        assert!(limiter.check_rate_limit("1.2.3.4"));
    }
}
