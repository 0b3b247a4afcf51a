//! Login flows for admins and users.
//!
//! Both flows follow the same order: rate limit, name lookup, ban check,
//! password verification, password expiry, session creation, audit. Every
//! way a credential can be wrong (malformed name, unknown name, bad
//! password) produces the same authentication error, so responses do not
//! reveal which accounts exist.

use crate::Services;
use crate::auth::{SessionOwner, SessionToken};
use crate::db::{AdminsQueries, AuditQueries, StoreTransaction, UsersQueries};
use crate::errors::{CommandError, Result};
use crate::model::{Admin, AuditEventCreate, Idname, PasswordRecord, User};
use crate::types::abbrev_uuid;
use tracing::{error, info, instrument};

fn invalid_credentials() -> CommandError {
    CommandError::authentication("Invalid username or password.")
}

/// Verify a password against a stored record on a blocking thread. Argon2
/// is deliberately slow, so it must not run on the async executor.
async fn verify_blocking(record: PasswordRecord, password: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || record.verify(&password)).await??)
}

/// Authenticate an admin and open a session for it.
#[instrument(skip_all, fields(username = %username))]
pub async fn admin_login<S>(
    store: &mut S,
    services: &Services,
    username: &str,
    password: &str,
) -> Result<(Admin, SessionToken)>
where
    S: AdminsQueries + AuditQueries + Send,
{
    if !services.login_limiter.try_acquire(&format!("admin:{username}")) {
        return Err(CommandError::RateLimitExceeded);
    }

    let now = services.clock.now();

    let Ok(idname) = username.parse::<Idname>() else {
        return Err(invalid_credentials());
    };
    let Some(admin) = store.admin_get_by_idname(&idname).await? else {
        return Err(invalid_credentials());
    };

    if let Some(ban) = store.admin_ban_get(admin.id).await? {
        if !ban.is_expired(now) {
            return Err(CommandError::Banned { reason: ban.reason });
        }
    }

    if !verify_blocking(admin.password.clone(), password.to_string()).await? {
        return Err(invalid_credentials());
    }
    if admin.password.is_expired(now) {
        return Err(CommandError::authentication("The password has expired."));
    }

    let (token, _) = services.sessions.create(SessionOwner::Admin(admin.id)).await;

    store
        .audit_put(&AuditEventCreate {
            time: now,
            owner: admin.id,
            event_type: "ADMIN_LOGGED_IN".to_string(),
            message: admin.idname.to_string(),
        })
        .await?;

    info!(admin_id = %abbrev_uuid(&admin.id), "admin logged in");
    Ok((admin, token))
}

/// Authenticate a user and open a session for it.
#[instrument(skip_all, fields(username = %username))]
pub async fn user_login<S>(
    store: &mut S,
    services: &Services,
    username: &str,
    password: &str,
) -> Result<(User, SessionToken)>
where
    S: UsersQueries + AuditQueries + Send,
{
    if !services.login_limiter.try_acquire(&format!("user:{username}")) {
        return Err(CommandError::RateLimitExceeded);
    }

    let now = services.clock.now();

    let Ok(idname) = username.parse::<Idname>() else {
        return Err(invalid_credentials());
    };
    let Some(user) = store.user_get_by_idname(&idname).await? else {
        return Err(invalid_credentials());
    };

    if let Some(ban) = store.user_ban_get(user.id).await? {
        if !ban.is_expired(now) {
            return Err(CommandError::Banned { reason: ban.reason });
        }
    }

    if !verify_blocking(user.password.clone(), password.to_string()).await? {
        return Err(invalid_credentials());
    }
    if user.password.is_expired(now) {
        return Err(CommandError::authentication("The password has expired."));
    }

    let (token, _) = services.sessions.create(SessionOwner::User(user.id)).await;

    store
        .audit_put(&AuditEventCreate {
            time: now,
            owner: user.id,
            event_type: "USER_LOGGED_IN".to_string(),
            message: user.idname.to_string(),
        })
        .await?;

    info!(user_id = %abbrev_uuid(&user.id), "user logged in");
    Ok((user, token))
}

/// [`user_login`] wrapped in the usual transaction discipline: the login
/// audit event commits on success, and nothing is kept on failure.
pub async fn user_login_transactional<T>(
    mut tx: T,
    services: &Services,
    username: &str,
    password: &str,
) -> Result<(User, SessionToken)>
where
    T: StoreTransaction,
{
    match user_login(&mut tx, services, username, password).await {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                error!(error = %rollback_error, "failed to roll back after login failure");
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Services;
    use crate::auth::{LoginRateLimiter, SessionService};
    use crate::clock::SystemClock;
    use crate::errors::ErrorKind;
    use crate::model::PermissionSet;
    use crate::test_utils::{MemoryStore, admin_fixture, user_fixture};
    use chrono::{TimeDelta, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    fn services() -> Services {
        Services::builder()
            .clock(Arc::new(SystemClock))
            .sessions(SessionService::new(16, Duration::from_secs(60)))
            .login_limiter(Arc::new(LoginRateLimiter::new(Duration::ZERO)))
            .build()
    }

    #[tokio::test]
    async fn test_user_login_creates_a_user_session() {
        let services = services();
        let store = MemoryStore::new();
        let mut user = user_fixture("harpo");
        user.password = PasswordRecord::new("honk").unwrap();
        store.seed_user(user.clone());

        let mut tx = store.clone();
        let (logged_in, token) = user_login(&mut tx, &services, "harpo", "honk").await.unwrap();

        assert_eq!(logged_in.id, user.id);
        let session = services.sessions.get(&token).await.unwrap();
        assert_eq!(session.owner, SessionOwner::User(user.id));
        assert_eq!(store.audit_events().last().unwrap().event_type, "USER_LOGGED_IN");
    }

    #[tokio::test]
    async fn test_expired_passwords_are_refused() {
        let services = services();
        let store = MemoryStore::new();
        let mut admin = admin_fixture("grouch", PermissionSet::all());
        admin.password = PasswordRecord::new("swordfish").unwrap();
        admin.password.expires = Some(Utc::now() - TimeDelta::seconds(5));
        store.seed_admin(admin);

        let mut tx = store.clone();
        let error = admin_login(&mut tx, &services, "grouch", "swordfish").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::AuthenticationError);
        assert!(error.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_malformed_usernames_fail_like_unknown_ones() {
        let services = services();
        let store = MemoryStore::new();

        let mut tx = store.clone();
        let malformed = admin_login(&mut tx, &services, "no spaces allowed", "pw").await.unwrap_err();
        let unknown = admin_login(&mut tx, &services, "nobody", "pw").await.unwrap_err();

        assert_eq!(malformed.kind(), ErrorKind::AuthenticationError);
        assert_eq!(malformed.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_user_login_transactional_commits_and_rolls_back() {
        let services = services();
        let store = MemoryStore::new();
        let mut user = user_fixture("harpo");
        user.password = PasswordRecord::new("honk").unwrap();
        store.seed_user(user);

        let error = user_login_transactional(store.clone(), &services, "harpo", "wrong")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationError);
        assert_eq!(store.rolled_back(), 1);
        assert!(store.audit_events().is_empty());

        user_login_transactional(store.clone(), &services, "harpo", "honk").await.unwrap();
        assert_eq!(store.committed(), 1);
        assert_eq!(store.audit_events().len(), 1);
    }
}
