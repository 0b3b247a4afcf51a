//! Handlers for user account commands.

use crate::command::{CommandContext, Response};
use crate::db::IdentityStore;
use crate::errors::{CommandError, Result};
use crate::model::{Ban, EmailAddress, Idname, User, UserUpdate};
use crate::search::{UserSearchByEmailParameters, UserSearchParameters};
use crate::security::SecurityAction;
use crate::types::UserId;
use uuid::Uuid;

pub(crate) async fn ban_create<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, ban: Ban) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserBanCreate)?;
    ctx.store().user_get_require(ban.target).await?;
    ctx.store().user_ban_create(&ban).await?;
    ctx.audit("USER_BANNED", format!("{}|{}", ban.target, ban.reason)).await?;
    Ok(Response::UserBanCreated { ban })
}

pub(crate) async fn ban_delete<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, user: UserId) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserBanDelete)?;
    ctx.store().user_get_require(user).await?;
    let ban = Ban { target: user, reason: String::new(), expires: None };
    ctx.store().user_ban_delete(&ban).await?;
    ctx.audit("USER_BAN_REMOVED", user.to_string()).await?;
    Ok(Response::UserBanDeleted)
}

pub(crate) async fn ban_get<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, user: UserId) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserBanGet)?;
    ctx.store().user_get_require(user).await?;
    let ban = ctx.store().user_ban_get(user).await?;
    Ok(Response::UserBanFound { ban })
}

pub(crate) async fn create<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    idname: Idname,
    real_name: String,
    email: EmailAddress,
    password: String,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserCreate)?;

    let now = ctx.now();
    let password = super::hash_password(password).await?;
    let user = User {
        id: Uuid::new_v4(),
        idname,
        real_name,
        emails: vec![email],
        time_created: now,
        time_updated: now,
        password,
    };

    ctx.store().user_create(&user).await?;
    ctx.audit("USER_CREATED", user.id.to_string()).await?;
    Ok(Response::UserCreated { user })
}

pub(crate) async fn delete<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, user: UserId) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserDelete)?;
    ctx.store().user_delete(user).await?;
    ctx.audit("USER_DELETED", user.to_string()).await?;
    Ok(Response::UserDeleted)
}

pub(crate) async fn email_add<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    user: UserId,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserEmailAdd)?;
    ctx.store().user_get_require(user).await?;
    ctx.store().user_email_add(user, &email).await?;

    let update = UserUpdate::builder().time_updated(ctx.now()).build();
    let updated = ctx.store().user_update(user, &update).await?;

    ctx.audit("USER_EMAIL_ADDED", format!("{user}|{email}")).await?;
    Ok(Response::UserUpdated { user: updated })
}

pub(crate) async fn email_remove<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    user: UserId,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserEmailRemove)?;
    ctx.store().user_get_require(user).await?;
    ctx.store().user_email_remove(user, &email).await?;

    let update = UserUpdate::builder().time_updated(ctx.now()).build();
    let updated = ctx.store().user_update(user, &update).await?;

    ctx.audit("USER_EMAIL_REMOVED", format!("{user}|{email}")).await?;
    Ok(Response::UserUpdated { user: updated })
}

pub(crate) async fn get<S: IdentityStore>(ctx: &mut CommandContext<'_, S>, user: UserId) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let user = ctx.store().user_get(user).await?;
    Ok(Response::UserFound { user })
}

pub(crate) async fn get_by_email<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    email: EmailAddress,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let user = ctx.store().user_get_by_email(&email).await?;
    Ok(Response::UserFound { user })
}

pub(crate) async fn update_credentials<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    user: UserId,
    idname: Option<Idname>,
    real_name: Option<String>,
    password: Option<String>,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserUpdateCredentials)?;

    let password = match password {
        Some(password) => Some(super::hash_password(password).await?),
        None => None,
    };
    let update = UserUpdate::builder()
        .maybe_idname(idname)
        .maybe_real_name(real_name)
        .maybe_password(password)
        .time_updated(ctx.now())
        .build();
    let updated = ctx.store().user_update(user, &update).await?;

    ctx.audit("USER_UPDATED", user.to_string()).await?;
    Ok(Response::UserUpdated { user: updated })
}

pub(crate) async fn search_begin<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    parameters: UserSearchParameters,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let page = search.begin_users(parameters).page_current(ctx.store()).await?;
    Ok(Response::UserPage { page })
}

pub(crate) async fn search_next<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .users()
        .ok_or_else(|| CommandError::protocol("The user search has not been started."))?;
    let page = cursor.page_next(ctx.store()).await?;
    Ok(Response::UserPage { page })
}

pub(crate) async fn search_previous<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .users()
        .ok_or_else(|| CommandError::protocol("The user search has not been started."))?;
    let page = cursor.page_previous(ctx.store()).await?;
    Ok(Response::UserPage { page })
}

pub(crate) async fn search_by_email_begin<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    parameters: UserSearchByEmailParameters,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let page = search.begin_users_by_email(parameters).page_current(ctx.store()).await?;
    Ok(Response::UserPage { page })
}

pub(crate) async fn search_by_email_next<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .users_by_email()
        .ok_or_else(|| CommandError::protocol("The user search by email has not been started."))?;
    let page = cursor.page_next(ctx.store()).await?;
    Ok(Response::UserPage { page })
}

pub(crate) async fn search_by_email_previous<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::UserRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .users_by_email()
        .ok_or_else(|| CommandError::protocol("The user search by email has not been started."))?;
    let page = cursor.page_previous(ctx.store()).await?;
    Ok(Response::UserPage { page })
}
