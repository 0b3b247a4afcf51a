//! Per-command execution context.

use crate::Services;
use crate::auth::{SessionOwner, SessionState, SessionToken};
use crate::db::{AdminsQueries, AuditQueries};
use crate::errors::{CommandError, Result};
use crate::model::{Admin, AuditEventCreate};
use crate::security::{self, Decision, SecurityAction};
use crate::types::RequestId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// The admin behind an authenticated command, together with the session
/// state its search cursors live in.
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    pub admin: Admin,
    pub session: Arc<SessionState>,
}

impl AuthenticatedAdmin {
    /// Resolve a session token to the admin that owns it.
    ///
    /// The admin record is re-read from the store so that permission and ban
    /// changes made since login take effect on the next command.
    #[instrument(skip_all, err)]
    pub async fn resolve<S>(store: &mut S, services: &Services, token: &SessionToken) -> Result<Self>
    where
        S: AdminsQueries,
    {
        let Some(session) = services.sessions.get(token).await else {
            return Err(CommandError::authentication("The session token is invalid or has expired."));
        };
        let SessionOwner::Admin(admin_id) = session.owner else {
            return Err(CommandError::authentication("The session does not belong to an admin."));
        };
        let Some(admin) = store.admin_get(admin_id).await? else {
            return Err(CommandError::authentication("The session's admin no longer exists."));
        };
        Ok(Self { admin, session })
    }
}

/// Everything a command handler needs: the store transaction, the shared
/// services, the request id for error responses, and the authenticated
/// admin (absent only for `LOGIN`).
pub struct CommandContext<'a, S> {
    store: &'a mut S,
    services: &'a Services,
    request_id: RequestId,
    identity: Option<AuthenticatedAdmin>,
}

impl<'a, S> CommandContext<'a, S> {
    pub fn new(
        store: &'a mut S,
        services: &'a Services,
        request_id: RequestId,
        identity: Option<AuthenticatedAdmin>,
    ) -> Self {
        Self { store, services, request_id, identity }
    }

    pub fn store(&mut self) -> &mut S {
        self.store
    }

    pub fn services(&self) -> &Services {
        self.services
    }

    /// Both halves at once, for flows that need the store and the services
    /// in a single call.
    pub fn store_and_services(&mut self) -> (&mut S, &Services) {
        (&mut *self.store, self.services)
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    /// The authenticated admin, or an authentication error for commands
    /// executed without one.
    pub fn admin(&self) -> Result<&AuthenticatedAdmin> {
        self.identity
            .as_ref()
            .ok_or_else(|| CommandError::authentication("The command requires an authenticated admin."))
    }

    /// The session state holding this admin's search cursors.
    pub fn session(&self) -> Result<Arc<SessionState>> {
        Ok(Arc::clone(&self.admin()?.session))
    }

    /// Run the security policy for `action` on behalf of the authenticated
    /// admin, returning that admin when the action is allowed.
    pub fn security_check(&self, action: &SecurityAction) -> Result<Admin> {
        let admin = &self.admin()?.admin;
        match security::check(admin, action) {
            Decision::Allowed => Ok(admin.clone()),
            Decision::Denied { reason } => Err(CommandError::SecurityPolicyDenied { reason }),
        }
    }
}

impl<S> CommandContext<'_, S>
where
    S: AuditQueries,
{
    /// Record an audit event owned by the authenticated admin.
    pub async fn audit(&mut self, event_type: &str, message: impl Into<String>) -> Result<()> {
        let owner = self.admin()?.admin.id;
        self.audit_for(owner, event_type, message).await
    }

    /// Record an audit event with an explicit owner.
    pub async fn audit_for(&mut self, owner: Uuid, event_type: &str, message: impl Into<String>) -> Result<()> {
        let event = AuditEventCreate {
            time: self.now(),
            owner,
            event_type: event_type.to_string(),
            message: message.into(),
        };
        self.store.audit_put(&event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LoginRateLimiter, SessionService};
    use crate::clock::SystemClock;
    use crate::errors::ErrorKind;
    use crate::model::{PasswordRecord, Permission, PermissionSet};
    use chrono::Utc;
    use std::time::Duration;

    struct NoStore;

    fn services() -> Services {
        Services::builder()
            .clock(Arc::new(SystemClock))
            .sessions(SessionService::new(16, Duration::from_secs(60)))
            .login_limiter(Arc::new(LoginRateLimiter::new(Duration::ZERO)))
            .build()
    }

    fn admin_with(permissions: PermissionSet) -> Admin {
        let now = Utc::now();
        Admin {
            id: Uuid::new_v4(),
            idname: "context-admin".parse().unwrap(),
            real_name: "Context Admin".to_string(),
            emails: vec!["context@example.com".parse().unwrap()],
            time_created: now,
            time_updated: now,
            password: PasswordRecord { hash: "$argon2id$unused".to_string(), expires: None },
            permissions,
        }
    }

    #[tokio::test]
    async fn test_security_check_without_identity_is_an_authentication_error() {
        let services = services();
        let mut store = NoStore;
        let ctx = CommandContext::new(&mut store, &services, Uuid::new_v4(), None);

        let error = ctx.security_check(&SecurityAction::AuditRead).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn test_security_check_maps_denials() {
        let services = services();
        let admin = admin_with(PermissionSet::empty());
        let (_, session) = services.sessions.create(SessionOwner::Admin(admin.id)).await;
        let identity = AuthenticatedAdmin { admin, session };

        let mut store = NoStore;
        let ctx = CommandContext::new(&mut store, &services, Uuid::new_v4(), Some(identity));

        let error = ctx.security_check(&SecurityAction::AuditRead).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::SecurityPolicyDenied);

        let granted = admin_with(PermissionSet::of([Permission::AuditRead]));
        let (_, session) = services.sessions.create(SessionOwner::Admin(granted.id)).await;
        let identity = AuthenticatedAdmin { admin: granted.clone(), session };
        let ctx = CommandContext::new(&mut store, &services, Uuid::new_v4(), Some(identity));

        let acting = ctx.security_check(&SecurityAction::AuditRead).unwrap();
        assert_eq!(acting.id, granted.id);
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_tokens() {
        let services = services();

        struct EmptyAdmins;

        #[async_trait::async_trait]
        impl AdminsQueries for EmptyAdmins {
            async fn admin_create(&mut self, _admin: &Admin) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_get(&mut self, _id: crate::types::AdminId) -> crate::db::Result<Option<Admin>> {
                Ok(None)
            }
            async fn admin_get_by_idname(
                &mut self,
                _idname: &crate::model::Idname,
            ) -> crate::db::Result<Option<Admin>> {
                Ok(None)
            }
            async fn admin_get_by_email(
                &mut self,
                _email: &crate::model::EmailAddress,
            ) -> crate::db::Result<Option<Admin>> {
                Ok(None)
            }
            async fn admin_update(
                &mut self,
                _id: crate::types::AdminId,
                _update: &crate::model::AdminUpdate,
            ) -> crate::db::Result<Admin> {
                unreachable!()
            }
            async fn admin_delete(&mut self, _id: crate::types::AdminId) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_email_add(
                &mut self,
                _id: crate::types::AdminId,
                _email: &crate::model::EmailAddress,
            ) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_email_remove(
                &mut self,
                _id: crate::types::AdminId,
                _email: &crate::model::EmailAddress,
            ) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_ban_create(&mut self, _ban: &crate::model::Ban) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_ban_get(
                &mut self,
                _id: crate::types::AdminId,
            ) -> crate::db::Result<Option<crate::model::Ban>> {
                Ok(None)
            }
            async fn admin_ban_delete(&mut self, _ban: &crate::model::Ban) -> crate::db::Result<()> {
                unreachable!()
            }
            async fn admin_count(&mut self) -> crate::db::Result<u64> {
                Ok(0)
            }
        }

        let mut store = EmptyAdmins;
        let token = SessionToken::from("not-a-real-token");
        let error = AuthenticatedAdmin::resolve(&mut store, &services, &token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationError);

        // A token whose admin has since been deleted is equally invalid.
        let (token, _) = services.sessions.create(SessionOwner::Admin(Uuid::new_v4())).await;
        let error = AuthenticatedAdmin::resolve(&mut store, &services, &token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthenticationError);
    }
}
