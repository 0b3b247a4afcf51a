//! Command dispatch and transaction discipline.
//!
//! [`execute`] maps each command to its handler. [`execute_transactional`]
//! wraps that in a store transaction: the transaction commits only when the
//! handler returns a successful, non-error response, and every other outcome
//! rolls back. This is the only place commit and rollback are decided.

use crate::Services;
use crate::command::context::{AuthenticatedAdmin, CommandContext};
use crate::command::handlers;
use crate::command::{Command, Response};
use crate::db::{IdentityStore, StoreTransaction};
use crate::errors::{ErrorResponse, Result};
use crate::types::{RequestId, abbrev_uuid};
use tracing::{error, instrument, warn};

/// Run one command against the context's store.
pub async fn execute<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, command: Command) -> Result<Response> {
    match command {
        Command::Login { username, password } => handlers::auth::login(ctx, username, password).await,

        Command::AdminBanCreate { ban } => handlers::admins::ban_create(ctx, ban).await,
        Command::AdminBanDelete { admin } => handlers::admins::ban_delete(ctx, admin).await,
        Command::AdminBanGet { admin } => handlers::admins::ban_get(ctx, admin).await,
        Command::AdminCreate { idname, real_name, email, password, permissions } => {
            handlers::admins::create(ctx, idname, real_name, email, password, permissions).await
        }
        Command::AdminDelete { admin } => handlers::admins::delete(ctx, admin).await,
        Command::AdminEmailAdd { admin, email } => handlers::admins::email_add(ctx, admin, email).await,
        Command::AdminEmailRemove { admin, email } => handlers::admins::email_remove(ctx, admin, email).await,
        Command::AdminGet { admin } => handlers::admins::get(ctx, admin).await,
        Command::AdminGetByEmail { email } => handlers::admins::get_by_email(ctx, email).await,
        Command::AdminPermissionGrant { admin, permission } => {
            handlers::admins::permission_grant(ctx, admin, permission).await
        }
        Command::AdminPermissionRevoke { admin, permission } => {
            handlers::admins::permission_revoke(ctx, admin, permission).await
        }
        Command::AdminSearchBegin { parameters } => handlers::admins::search_begin(ctx, parameters).await,
        Command::AdminSearchNext => handlers::admins::search_next(ctx).await,
        Command::AdminSearchPrevious => handlers::admins::search_previous(ctx).await,
        Command::AdminSearchByEmailBegin { parameters } => {
            handlers::admins::search_by_email_begin(ctx, parameters).await
        }
        Command::AdminSearchByEmailNext => handlers::admins::search_by_email_next(ctx).await,
        Command::AdminSearchByEmailPrevious => handlers::admins::search_by_email_previous(ctx).await,
        Command::AdminSelf => handlers::admins::admin_self(ctx).await,
        Command::AdminUpdateCredentials { admin, idname, real_name, password } => {
            handlers::admins::update_credentials(ctx, admin, idname, real_name, password).await
        }

        Command::AuditSearchBegin { parameters } => handlers::audit::search_begin(ctx, parameters).await,
        Command::AuditSearchNext => handlers::audit::search_next(ctx).await,
        Command::AuditSearchPrevious => handlers::audit::search_previous(ctx).await,

        Command::UserBanCreate { ban } => handlers::users::ban_create(ctx, ban).await,
        Command::UserBanDelete { user } => handlers::users::ban_delete(ctx, user).await,
        Command::UserBanGet { user } => handlers::users::ban_get(ctx, user).await,
        Command::UserCreate { idname, real_name, email, password } => {
            handlers::users::create(ctx, idname, real_name, email, password).await
        }
        Command::UserDelete { user } => handlers::users::delete(ctx, user).await,
        Command::UserEmailAdd { user, email } => handlers::users::email_add(ctx, user, email).await,
        Command::UserEmailRemove { user, email } => handlers::users::email_remove(ctx, user, email).await,
        Command::UserGet { user } => handlers::users::get(ctx, user).await,
        Command::UserGetByEmail { email } => handlers::users::get_by_email(ctx, email).await,
        Command::UserSearchBegin { parameters } => handlers::users::search_begin(ctx, parameters).await,
        Command::UserSearchNext => handlers::users::search_next(ctx).await,
        Command::UserSearchPrevious => handlers::users::search_previous(ctx).await,
        Command::UserSearchByEmailBegin { parameters } => {
            handlers::users::search_by_email_begin(ctx, parameters).await
        }
        Command::UserSearchByEmailNext => handlers::users::search_by_email_next(ctx).await,
        Command::UserSearchByEmailPrevious => handlers::users::search_by_email_previous(ctx).await,
        Command::UserUpdateCredentials { user, idname, real_name, password } => {
            handlers::users::update_credentials(ctx, user, idname, real_name, password).await
        }
    }
}

/// Run one command inside `tx`, committing only for a successful non-error
/// response. Failures never escape: they come back as [`Response::Error`].
#[instrument(skip_all, fields(command = command.name(), request_id = %abbrev_uuid(&request_id)))]
pub async fn execute_transactional<T>(
    mut tx: T,
    services: &Services,
    request_id: RequestId,
    identity: Option<AuthenticatedAdmin>,
    command: Command,
) -> Response
where
    T: StoreTransaction,
{
    let mut ctx = CommandContext::new(&mut tx, services, request_id, identity);
    let result = execute(&mut ctx, command).await;

    match result {
        Ok(response) if !response.is_error() => match tx.commit().await {
            Ok(()) => response,
            Err(commit_error) => {
                error!(error = %commit_error, "failed to commit command transaction");
                Response::Error(ErrorResponse::of(request_id, &commit_error.into()))
            }
        },
        Ok(response) => {
            rollback_quietly(tx).await;
            response
        }
        Err(command_error) => {
            warn!(error = %command_error, "command failed");
            rollback_quietly(tx).await;
            Response::Error(ErrorResponse::of(request_id, &command_error))
        }
    }
}

async fn rollback_quietly<T: StoreTransaction>(tx: T) {
    if let Err(rollback_error) = tx.rollback().await {
        error!(error = %rollback_error, "failed to roll back command transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LoginRateLimiter, SessionOwner, SessionService};
    use crate::clock::{Clock, SystemClock};
    use crate::errors::ErrorKind;
    use crate::model::{Admin, Ban, PasswordRecord, Permission, PermissionSet};
    use crate::search::{AdminSearchParameters, SearchLimit, UserSearchParameters};
    use crate::test_utils::{FixedClock, MemoryStore, StoreCall, admin_fixture, user_fixture};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn services_with(clock: Arc<dyn Clock>, login_delay: Duration) -> Services {
        Services::builder()
            .clock(clock)
            .sessions(SessionService::new(64, Duration::from_secs(600)))
            .login_limiter(Arc::new(LoginRateLimiter::new(login_delay)))
            .build()
    }

    fn services() -> Services {
        services_with(Arc::new(SystemClock), Duration::ZERO)
    }

    async fn identity_for(services: &Services, admin: &Admin) -> AuthenticatedAdmin {
        let (_, session) = services.sessions.create(SessionOwner::Admin(admin.id)).await;
        AuthenticatedAdmin { admin: admin.clone(), session }
    }

    async fn run(
        store: &MemoryStore,
        services: &Services,
        identity: &AuthenticatedAdmin,
        command: Command,
    ) -> Response {
        execute_transactional(store.clone(), services, Uuid::new_v4(), Some(identity.clone()), command).await
    }

    fn error_code(response: &Response) -> ErrorKind {
        match response {
            Response::Error(e) => e.error_code,
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_ban_delete_passes_the_reconstructed_ban_to_the_store() {
        let services = services();
        let store = MemoryStore::new();
        let target = admin_fixture("target", PermissionSet::empty());
        store.seed_admin(target.clone());
        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminBan]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let response = run(&store, &services, &identity, Command::AdminBanDelete { admin: target.id }).await;

        assert_eq!(response, Response::AdminBanDeleted);
        assert!(store.calls().contains(&StoreCall::AdminBanDelete(Ban {
            target: target.id,
            reason: String::new(),
            expires: None,
        })));
        assert_eq!(store.committed(), 1);
        assert_eq!(store.rolled_back(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_denied_commands_touch_nothing_and_roll_back() {
        let services = services();
        let store = MemoryStore::new();
        let target = admin_fixture("target", PermissionSet::empty());
        store.seed_admin(target.clone());
        let actor = admin_fixture("actor", PermissionSet::empty());
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let response = run(&store, &services, &identity, Command::AdminDelete { admin: target.id }).await;

        assert_eq!(error_code(&response), ErrorKind::SecurityPolicyDenied);
        assert!(store.calls().is_empty());
        assert_eq!(store.committed(), 0);
        assert_eq!(store.rolled_back(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_nonexistent_targets_surface_their_domain_code() {
        let services = services();
        let store = MemoryStore::new();
        let actor = admin_fixture("actor", PermissionSet::all());
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let missing = Uuid::new_v4();
        let ban = Ban { target: missing, reason: "spam".to_string(), expires: None };
        let response = run(&store, &services, &identity, Command::UserBanCreate { ban }).await;

        assert_eq!(error_code(&response), ErrorKind::UserNonexistent);
        assert_eq!(store.rolled_back(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_search_limits_arrive_at_the_store_clamped() {
        let services = services();
        let store = MemoryStore::new();
        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminRead]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let parameters = AdminSearchParameters::builder().limit(SearchLimit::from(2000)).build();
        let response = run(&store, &services, &identity, Command::AdminSearchBegin { parameters }).await;

        match response {
            Response::AdminPage { page } => assert_eq!(page.page_index, 1),
            other => panic!("expected an admin page, got {other:?}"),
        }
        assert!(store.calls().contains(&StoreCall::AdminSearch { limit: 1000, page_index: 1 }));
    }

    #[test_log::test(tokio::test)]
    async fn test_search_next_before_begin_is_a_protocol_error() {
        let services = services();
        let store = MemoryStore::new();
        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminRead]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let response = run(&store, &services, &identity, Command::AdminSearchNext).await;
        assert_eq!(error_code(&response), ErrorKind::ProtocolError);
    }

    #[test_log::test(tokio::test)]
    async fn test_user_search_pages_across_commands() {
        let services = services();
        let store = MemoryStore::new();
        let actor = admin_fixture("actor", PermissionSet::of([Permission::UserRead]));
        store.seed_admin(actor.clone());
        for index in 0..25 {
            store.seed_user(user_fixture(&format!("user-{index:02}")));
        }
        let identity = identity_for(&services, &actor).await;

        let parameters = UserSearchParameters::builder().limit(SearchLimit::from(10)).build();
        let page = match run(&store, &services, &identity, Command::UserSearchBegin { parameters }).await {
            Response::UserPage { page } => page,
            other => panic!("expected a user page, got {other:?}"),
        };
        assert_eq!((page.page_index, page.page_count, page.items.len()), (1, 3, 10));

        let page = match run(&store, &services, &identity, Command::UserSearchNext).await {
            Response::UserPage { page } => page,
            other => panic!("expected a user page, got {other:?}"),
        };
        assert_eq!((page.page_index, page.items.len()), (2, 10));

        let page = match run(&store, &services, &identity, Command::UserSearchNext).await {
            Response::UserPage { page } => page,
            other => panic!("expected a user page, got {other:?}"),
        };
        assert_eq!((page.page_index, page.items.len()), (3, 5));

        // The cursor clamps at the last page rather than failing.
        let page = match run(&store, &services, &identity, Command::UserSearchNext).await {
            Response::UserPage { page } => page,
            other => panic!("expected a user page, got {other:?}"),
        };
        assert_eq!((page.page_index, page.items.len()), (3, 5));

        let page = match run(&store, &services, &identity, Command::UserSearchPrevious).await {
            Response::UserPage { page } => page,
            other => panic!("expected a user page, got {other:?}"),
        };
        assert_eq!((page.page_index, page.items.len()), (2, 10));
    }

    #[test_log::test(tokio::test)]
    async fn test_permission_grant_requires_holding_the_permission() {
        let services = services();
        let store = MemoryStore::new();
        let target = admin_fixture("target", PermissionSet::empty());
        store.seed_admin(target.clone());

        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminWritePermissions]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let command = Command::AdminPermissionGrant { admin: target.id, permission: Permission::AuditRead };
        let response = run(&store, &services, &identity, command.clone()).await;
        assert_eq!(error_code(&response), ErrorKind::SecurityPolicyDenied);

        let actor = admin_fixture(
            "actor-2",
            PermissionSet::of([Permission::AdminWritePermissions, Permission::AuditRead]),
        );
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let response = run(&store, &services, &identity, command).await;
        match response {
            Response::AdminUpdated { admin } => {
                assert!(admin.permissions.contains(Permission::AuditRead));
            }
            other => panic!("expected an updated admin, got {other:?}"),
        }
        let events = store.audit_events();
        assert_eq!(events.last().unwrap().event_type, "ADMIN_PERMISSION_GRANTED");
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_create_cannot_grant_beyond_the_creator() {
        let services = services();
        let store = MemoryStore::new();
        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminCreate]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let command = Command::AdminCreate {
            idname: "newcomer".parse().unwrap(),
            real_name: "New Comer".to_string(),
            email: "newcomer@example.com".parse().unwrap(),
            password: "initial password".to_string(),
            permissions: PermissionSet::of([Permission::AuditRead]),
        };
        let response = run(&store, &services, &identity, command).await;
        assert_eq!(error_code(&response), ErrorKind::SecurityPolicyDenied);
        assert!(store.calls().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_email_add_updates_the_account_stamp() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::TimeDelta::seconds(60);
        let services = services_with(Arc::new(FixedClock(t2)), Duration::ZERO);
        let store = MemoryStore::new();

        let mut target = admin_fixture("target", PermissionSet::empty());
        target.time_created = t1;
        target.time_updated = t1;
        store.seed_admin(target.clone());

        let actor = admin_fixture("actor", PermissionSet::of([Permission::AdminWriteEmail]));
        store.seed_admin(actor.clone());
        let identity = identity_for(&services, &actor).await;

        let email: crate::model::EmailAddress = "second@example.com".parse().unwrap();
        let command = Command::AdminEmailAdd { admin: target.id, email: email.clone() };
        let response = run(&store, &services, &identity, command).await;

        match response {
            Response::AdminUpdated { admin } => {
                assert!(admin.emails.contains(&email));
                assert_eq!(admin.time_updated, t2);
                assert_eq!(admin.time_created, t1);
            }
            other => panic!("expected an updated admin, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_login_round_trip_against_the_store() {
        let services = services();
        let store = MemoryStore::new();
        let mut admin = admin_fixture("grouch", PermissionSet::all());
        admin.password = PasswordRecord::new("swordfish").unwrap();
        store.seed_admin(admin.clone());

        // Wrong passwords and unknown names fail identically.
        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::Login { username: "grouch".to_string(), password: "sardine".to_string() },
        )
        .await;
        assert_eq!(error_code(&response), ErrorKind::AuthenticationError);
        assert_eq!(store.rolled_back(), 1);

        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::Login { username: "grouch".to_string(), password: "swordfish".to_string() },
        )
        .await;

        let token = match response {
            Response::LoggedIn { admin: logged_in, token } => {
                assert_eq!(logged_in.id, admin.id);
                token
            }
            other => panic!("expected a login response, got {other:?}"),
        };

        // The session is live and the login was audited and committed.
        assert!(services.sessions.get(&token).await.is_some());
        assert_eq!(store.audit_events().last().unwrap().event_type, "ADMIN_LOGGED_IN");
        assert_eq!(store.committed(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_is_rate_limited_per_username() {
        let services = services_with(Arc::new(SystemClock), Duration::from_secs(3600));
        let store = MemoryStore::new();
        let mut admin = admin_fixture("grouch", PermissionSet::all());
        admin.password = PasswordRecord::new("swordfish").unwrap();
        store.seed_admin(admin.clone());

        let login = Command::Login { username: "grouch".to_string(), password: "swordfish".to_string() };
        let response =
            execute_transactional(store.clone(), &services, Uuid::new_v4(), None, login.clone()).await;
        assert!(matches!(response, Response::LoggedIn { .. }));

        let response = execute_transactional(store.clone(), &services, Uuid::new_v4(), None, login).await;
        assert_eq!(error_code(&response), ErrorKind::RateLimitExceeded);
    }

    #[test_log::test(tokio::test)]
    async fn test_banned_admins_cannot_log_in() {
        let services = services();
        let store = MemoryStore::new();
        let mut admin = admin_fixture("grouch", PermissionSet::all());
        admin.password = PasswordRecord::new("swordfish").unwrap();
        store.seed_admin(admin.clone());
        store.seed_admin_ban(Ban { target: admin.id, reason: "conduct".to_string(), expires: None });

        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::Login { username: "grouch".to_string(), password: "swordfish".to_string() },
        )
        .await;
        assert_eq!(error_code(&response), ErrorKind::Banned);

        // An expired ban no longer blocks the account.
        store.seed_admin_ban(Ban {
            target: admin.id,
            reason: "conduct".to_string(),
            expires: Some(Utc::now() - chrono::TimeDelta::seconds(1)),
        });
        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::Login { username: "grouch".to_string(), password: "swordfish".to_string() },
        )
        .await;
        assert!(matches!(response, Response::LoggedIn { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_commands_require_an_authenticated_admin() {
        let services = services();
        let store = MemoryStore::new();

        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::AdminSelf,
        )
        .await;
        assert_eq!(error_code(&response), ErrorKind::AuthenticationError);
    }

    #[test_log::test(tokio::test)]
    async fn test_resolved_sessions_execute_against_fresh_admin_state() {
        let services = services();
        let store = MemoryStore::new();
        let mut admin = admin_fixture("grouch", PermissionSet::all());
        admin.password = PasswordRecord::new("swordfish").unwrap();
        store.seed_admin(admin.clone());

        let response = execute_transactional(
            store.clone(),
            &services,
            Uuid::new_v4(),
            None,
            Command::Login { username: "grouch".to_string(), password: "swordfish".to_string() },
        )
        .await;
        let token = match response {
            Response::LoggedIn { token, .. } => token,
            other => panic!("expected a login response, got {other:?}"),
        };

        let mut tx = store.clone();
        let identity = AuthenticatedAdmin::resolve(&mut tx, &services, &token).await.unwrap();
        let response = run(&store, &services, &identity, Command::AdminSelf).await;
        match response {
            Response::AdminSelf { admin: found } => assert_eq!(found.id, admin.id),
            other => panic!("expected the admin itself, got {other:?}"),
        }

        // Deleting the token ends the session.
        services.sessions.delete(&token).await;
        let error = AuthenticatedAdmin::resolve(&mut tx, &services, &token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationError);
    }
}
