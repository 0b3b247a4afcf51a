//! The `LOGIN` command.

use crate::auth::login::admin_login;
use crate::command::{CommandContext, Response};
use crate::db::IdentityStore;
use crate::errors::{ErrorResponse, Result};
use tracing::info;

/// Authentication failures become error responses so the executor rolls the
/// transaction back and nothing (not even the audit event) is kept.
/// Infrastructure failures propagate as errors in the usual way.
pub(crate) async fn login<S: IdentityStore>(
    ctx: &mut CommandContext<'_, S>,
    username: String,
    password: String,
) -> Result<Response> {
    let request_id = ctx.request_id();
    let (store, services) = ctx.store_and_services();

    match admin_login(store, services, &username, &password).await {
        Ok((admin, token)) => Ok(Response::LoggedIn { admin, token }),
        Err(error) if error.is_authentication_failure() => {
            info!(error = %error, "admin login refused");
            Ok(Response::Error(ErrorResponse::of(request_id, &error)))
        }
        Err(error) => Err(error),
    }
}
