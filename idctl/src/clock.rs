//! Time source abstraction.
//!
//! All command handlers and store implementations take their notion of "now" from a
//! [`Clock`] rather than calling [`Utc::now`] directly, so that tests can pin time
//! and ban/password expiry checks become deterministic.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
