//! Handlers for admin account commands.

use crate::command::{CommandContext, Response};
use crate::db::IdentityStore;
use crate::errors::{CommandError, Result};
use crate::model::{Admin, AdminUpdate, Ban, EmailAddress, Idname, Permission, PermissionSet};
use crate::search::{AdminSearchByEmailParameters, AdminSearchParameters};
use crate::security::SecurityAction;
use crate::types::AdminId;
use uuid::Uuid;

pub(crate) async fn ban_create<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, ban: Ban) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminBanCreate)?;
    ctx.store().admin_get_require(ban.target).await?;
    ctx.store().admin_ban_create(&ban).await?;
    ctx.audit("ADMIN_BANNED", format!("{}|{}", ban.target, ban.reason)).await?;
    Ok(Response::AdminBanCreated { ban })
}

pub(crate) async fn ban_delete<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, admin: AdminId) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminBanDelete)?;
    ctx.store().admin_get_require(admin).await?;
    let ban = Ban { target: admin, reason: String::new(), expires: None };
    ctx.store().admin_ban_delete(&ban).await?;
    ctx.audit("ADMIN_BAN_REMOVED", admin.to_string()).await?;
    Ok(Response::AdminBanDeleted)
}

pub(crate) async fn ban_get<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, admin: AdminId) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminBanGet)?;
    ctx.store().admin_get_require(admin).await?;
    let ban = ctx.store().admin_ban_get(admin).await?;
    Ok(Response::AdminBanFound { ban })
}

pub(crate) async fn create<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    idname: Idname,
    real_name: String,
    email: EmailAddress,
    password: String,
    permissions: PermissionSet,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminCreate { grants: permissions.clone() })?;

    let now = ctx.now();
    let password = super::hash_password(password).await?;
    let admin = Admin {
        id: Uuid::new_v4(),
        idname,
        real_name,
        emails: vec![email],
        time_created: now,
        time_updated: now,
        password,
        permissions,
    };

    ctx.store().admin_create(&admin).await?;
    ctx.audit("ADMIN_CREATED", admin.id.to_string()).await?;
    Ok(Response::AdminCreated { admin })
}

pub(crate) async fn delete<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, admin: AdminId) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminDelete)?;
    ctx.store().admin_delete(admin).await?;
    ctx.audit("ADMIN_DELETED", admin.to_string()).await?;
    Ok(Response::AdminDeleted)
}

pub(crate) async fn email_add<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    admin: AdminId,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminEmailAdd { target: admin })?;
    ctx.store().admin_get_require(admin).await?;
    ctx.store().admin_email_add(admin, &email).await?;

    let update = AdminUpdate::builder().time_updated(ctx.now()).build();
    let updated = ctx.store().admin_update(admin, &update).await?;

    ctx.audit("ADMIN_EMAIL_ADDED", format!("{admin}|{email}")).await?;
    Ok(Response::AdminUpdated { admin: updated })
}

pub(crate) async fn email_remove<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    admin: AdminId,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminEmailRemove { target: admin })?;
    ctx.store().admin_get_require(admin).await?;
    ctx.store().admin_email_remove(admin, &email).await?;

    let update = AdminUpdate::builder().time_updated(ctx.now()).build();
    let updated = ctx.store().admin_update(admin, &update).await?;

    ctx.audit("ADMIN_EMAIL_REMOVED", format!("{admin}|{email}")).await?;
    Ok(Response::AdminUpdated { admin: updated })
}

pub(crate) async fn get<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, admin: AdminId) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let admin = ctx.store().admin_get(admin).await?;
    Ok(Response::AdminFound { admin })
}

pub(crate) async fn get_by_email<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let admin = ctx.store().admin_get_by_email(&email).await?;
    Ok(Response::AdminFound { admin })
}

pub(crate) async fn permission_grant<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    admin: AdminId,
    permission: Permission,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminPermissionGrant { target: admin, permission })?;

    let target = ctx.store().admin_get_require(admin).await?;
    let update = AdminUpdate::builder()
        .permissions(target.permissions.grant(permission))
        .time_updated(ctx.now())
        .build();
    let updated = ctx.store().admin_update(admin, &update).await?;

    ctx.audit("ADMIN_PERMISSION_GRANTED", format!("{admin}|{permission}")).await?;
    Ok(Response::AdminUpdated { admin: updated })
}

pub(crate) async fn permission_revoke<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    admin: AdminId,
    permission: Permission,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminPermissionRevoke { target: admin, permission })?;

    let target = ctx.store().admin_get_require(admin).await?;
    let update = AdminUpdate::builder()
        .permissions(target.permissions.revoke(permission))
        .time_updated(ctx.now())
        .build();
    let updated = ctx.store().admin_update(admin, &update).await?;

    ctx.audit("ADMIN_PERMISSION_REVOKED", format!("{admin}|{permission}")).await?;
    Ok(Response::AdminUpdated { admin: updated })
}

pub(crate) async fn admin_self<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    let admin = ctx.admin()?.admin.clone();
    Ok(Response::AdminSelf { admin })
}

pub(crate) async fn update_credentials<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    admin: AdminId,
    idname: Option<Idname>,
    real_name: Option<String>,
    password: Option<String>,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminUpdateCredentials { target: admin })?;

    let password = match password {
        Some(password) => Some(super::hash_password(password).await?),
        None => None,
    };
    let update = AdminUpdate::builder()
        .maybe_idname(idname)
        .maybe_real_name(real_name)
        .maybe_password(password)
        .time_updated(ctx.now())
        .build();
    let updated = ctx.store().admin_update(admin, &update).await?;

    ctx.audit("ADMIN_UPDATED", admin.to_string()).await?;
    Ok(Response::AdminUpdated { admin: updated })
}

pub(crate) async fn search_begin<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    parameters: AdminSearchParameters,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let page = search.begin_admins(parameters).page_current(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}

pub(crate) async fn search_next<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .admins()
        .ok_or_else(|| CommandError::protocol("The admin search has not been started."))?;
    let page = cursor.page_next(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}

pub(crate) async fn search_previous<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .admins()
        .ok_or_else(|| CommandError::protocol("The admin search has not been started."))?;
    let page = cursor.page_previous(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}

pub(crate) async fn search_by_email_begin<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    parameters: AdminSearchByEmailParameters,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let page = search.begin_admins_by_email(parameters).page_current(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}

pub(crate) async fn search_by_email_next<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .admins_by_email()
        .ok_or_else(|| CommandError::protocol("The admin search by email has not been started."))?;
    let page = cursor.page_next(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}

pub(crate) async fn search_by_email_previous<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AdminRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .admins_by_email()
        .ok_or_else(|| CommandError::protocol("The admin search by email has not been started."))?;
    let page = cursor.page_previous(ctx.store()).await?;
    Ok(Response::AdminPage { page })
}
