//! Authentication: password hashing, login sessions and rate limiting.

pub mod login;
pub mod password;
pub mod rate_limit;
pub mod session;

pub use password::{PasswordError, PasswordRecord};
pub use rate_limit::LoginRateLimiter;
pub use session::{SessionOwner, SessionService, SessionState, SessionToken};
