//! Login rate limiting.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

/// Entries above this count trigger a sweep of expired usernames.
const PRUNE_THRESHOLD: usize = 1024;

/// A fixed-window rate limiter for login attempts, keyed by username.
///
/// The first attempt for a username opens a window; further attempts for the
/// same username are rejected until the window has elapsed. Successful logins
/// do not reset the window, so a stolen-credential guesser cannot go faster
/// by occasionally being right. Usernames are tracked pre-validation, which
/// also throttles probes with malformed names.
#[derive(Debug)]
pub struct LoginRateLimiter {
    window: Duration,
    attempts: DashMap<String, Instant>,
}

impl LoginRateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            attempts: DashMap::new(),
        }
    }

    /// Records an attempt for `username` and reports whether it may proceed.
    pub fn try_acquire(&self, username: &str) -> bool {
        let now = Instant::now();

        if self.attempts.len() > PRUNE_THRESHOLD {
            let window = self.window;
            self.attempts.retain(|_, opened| now.duration_since(*opened) < window);
        }

        match self.attempts.entry(username.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_is_allowed() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(20));
        assert!(limiter.try_acquire("grouch"));
    }

    #[test]
    fn test_repeat_attempt_within_window_is_rejected() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(50));
        assert!(limiter.try_acquire("grouch"));
        assert!(!limiter.try_acquire("grouch"));
    }

    #[test]
    fn test_usernames_are_limited_independently() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(50));
        assert!(limiter.try_acquire("grouch"));
        assert!(limiter.try_acquire("harpo"));
        assert!(!limiter.try_acquire("grouch"));
    }

    #[test]
    fn test_window_reopens_after_the_delay() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(10));
        assert!(limiter.try_acquire("grouch"));
        assert!(!limiter.try_acquire("grouch"));

        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.try_acquire("grouch"));
    }

    #[test]
    fn test_rejected_attempts_do_not_extend_the_window() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(20));
        assert!(limiter.try_acquire("grouch"));

        std::thread::sleep(Duration::from_millis(12));
        assert!(!limiter.try_acquire("grouch"));

        // The window opened at the first attempt, so it has now elapsed even
        // though a rejected attempt happened in between.
        std::thread::sleep(Duration::from_millis(12));
        assert!(limiter.try_acquire("grouch"));
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let limiter = LoginRateLimiter::new(Duration::from_millis(1));
        for n in 0..=PRUNE_THRESHOLD {
            limiter.try_acquire(&format!("user-{n}"));
        }
        std::thread::sleep(Duration::from_millis(5));

        // This attempt crosses the threshold and sweeps the expired entries.
        assert!(limiter.try_acquire("one-more"));
        assert!(limiter.attempts.len() <= 2);
    }
}
