//! Handlers for audit log searches.

use crate::command::{CommandContext, Response};
use crate::db::IdentityStore;
use crate::errors::{CommandError, Result};
use crate::search::AuditSearchParameters;
use crate::security::SecurityAction;

pub(crate) async fn search_begin<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    parameters: AuditSearchParameters,
) -> Result<Response> {
    ctx.security_check(&SecurityAction::AuditRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let page = search.begin_audit(parameters).page_current(ctx.store()).await?;
    Ok(Response::AuditPage { page })
}

pub(crate) async fn search_next<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AuditRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .audit()
        .ok_or_else(|| CommandError::protocol("The audit search has not been started."))?;
    let page = cursor.page_next(ctx.store()).await?;
    Ok(Response::AuditPage { page })
}

pub(crate) async fn search_previous<S: IdentityStore>(ctx: &mut CommandContext<'_, S>) -> Result<Response> {
    ctx.security_check(&SecurityAction::AuditRead)?;
    let session = ctx.session()?;
    let mut search = session.search.lock().await;
    let cursor = search
        .audit()
        .ok_or_else(|| CommandError::protocol("The audit search has not been started."))?;
    let page = cursor.page_previous(ctx.store()).await?;
    Ok(Response::AuditPage { page })
}
