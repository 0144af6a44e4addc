// Login throttling - sliding window of attempts per client
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Clients tracked at once; past this, expired entries are purged and
/// attempts from new clients are refused until room frees up.
const MAX_TRACKED_CLIENTS: usize = 10_000;

pub struct LoginRateLimiter {
    max_attempts: usize,
    window: Duration,
    max_tracked: usize,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            max_tracked: MAX_TRACKED_CLIENTS,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt from `client`. Returns false when the client has
    /// used up its attempts for the current window.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        if !attempts.contains_key(client) && attempts.len() >= self.max_tracked {
            attempts.retain(|_, times| times.iter().any(|t| now.duration_since(*t) < self.window));
            if attempts.len() >= self.max_tracked {
                tracing::warn!("Login limiter is tracking {} clients, refusing {}", attempts.len(), client);
                return false;
            }
        }

        let times = attempts.entry(client.to_string()).or_default();
        times.retain(|t| now.duration_since(*t) < self.window);
        if times.len() >= self.max_attempts {
            tracing::warn!(client = %client, attempts = times.len(), "Login rate limit exceeded");
            return false;
        }
        times.push(now);
        true
    }

    /// Forget a client's attempts after it logged in
    pub fn reset(&self, client: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_limited_per_window() {
        let limiter = LoginRateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1"));
        }
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_history() {
        let limiter = LoginRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        limiter.reset("10.0.0.1");
        assert!(limiter.check("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracked_clients_are_capped() {
        let mut limiter = LoginRateLimiter::new(5, Duration::from_secs(60));
        limiter.max_tracked = 2;

        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("c"));

        // once the window passes, stale clients make room
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("c"));
        assert_eq!(limiter.attempts.lock().unwrap().len(), 1);
    }
}
