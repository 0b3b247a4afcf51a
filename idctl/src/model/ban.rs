//! Account bans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ban placed on an account.
///
/// The same shape is used for admin and user bans; which table it lands in is
/// decided by the store method it is passed to. A ban with no expiry is
/// permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    /// The banned account.
    pub target: Uuid,
    pub reason: String,
    pub expires: Option<DateTime<Utc>>,
}

impl Ban {
    /// Whether this ban has lapsed as of `now`. Permanent bans never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_permanent_ban_never_expires() {
        let ban = Ban {
            target: Uuid::new_v4(),
            reason: "spam".to_string(),
            expires: None,
        };
        assert!(!ban.is_expired(Utc::now()));
        assert!(!ban.is_expired(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let ban = Ban {
            target: Uuid::new_v4(),
            reason: "spam".to_string(),
            expires: Some(now),
        };
        assert!(ban.is_expired(now));
        assert!(ban.is_expired(now + TimeDelta::seconds(1)));
        assert!(!ban.is_expired(now - TimeDelta::seconds(1)));
    }
}
