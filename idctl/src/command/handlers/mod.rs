//! One handler function per command. Handlers check security first, touch
//! the store through the context, and record audit events for writes; the
//! executor owns commit and rollback.

pub(crate) mod admins;
pub(crate) mod audit;
pub(crate) mod auth;
pub(crate) mod users;

use crate::errors::Result;
use crate::model::PasswordRecord;

/// Hash a new password on a blocking thread.
pub(crate) async fn hash_password(password: String) -> Result<PasswordRecord> {
    Ok(tokio::task::spawn_blocking(move || PasswordRecord::new(&password)).await??)
}
