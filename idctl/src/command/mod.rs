//! The admin command protocol.
//!
//! Commands arrive as internally tagged JSON values, run against a store
//! transaction through [`executor::execute_transactional`], and come back as
//! exactly one [`Response`]. Failures of any kind are reported as
//! [`Response::Error`]; the transaction commits only for a successful,
//! non-error response.

pub mod context;
pub mod executor;
mod handlers;

pub use context::{AuthenticatedAdmin, CommandContext};
pub use executor::{execute, execute_transactional};

use crate::errors::ErrorResponse;
use crate::model::{Admin, AdminSummary, AuditEvent, Ban, EmailAddress, Idname, Permission, PermissionSet, User, UserSummary};
use crate::search::{
    AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters, Page, UserSearchByEmailParameters,
    UserSearchParameters,
};
use crate::auth::SessionToken;
use crate::types::{AdminId, UserId};
use serde::{Deserialize, Serialize};

/// Every command an admin client can send.
///
/// `username` on [`Login`](Command::Login) is a raw string rather than a
/// validated name: login must treat an unknown and a malformed name the same
/// way, so validation happens inside the login flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Login { username: String, password: String },

    AdminBanCreate { ban: Ban },
    AdminBanDelete { admin: AdminId },
    AdminBanGet { admin: AdminId },
    AdminCreate {
        idname: Idname,
        real_name: String,
        email: EmailAddress,
        password: String,
        permissions: PermissionSet,
    },
    AdminDelete { admin: AdminId },
    AdminEmailAdd { admin: AdminId, email: EmailAddress },
    AdminEmailRemove { admin: AdminId, email: EmailAddress },
    AdminGet { admin: AdminId },
    AdminGetByEmail { email: EmailAddress },
    AdminPermissionGrant { admin: AdminId, permission: Permission },
    AdminPermissionRevoke { admin: AdminId, permission: Permission },
    AdminSearchBegin { parameters: AdminSearchParameters },
    AdminSearchNext,
    AdminSearchPrevious,
    AdminSearchByEmailBegin { parameters: AdminSearchByEmailParameters },
    AdminSearchByEmailNext,
    AdminSearchByEmailPrevious,
    AdminSelf,
    AdminUpdateCredentials {
        admin: AdminId,
        idname: Option<Idname>,
        real_name: Option<String>,
        password: Option<String>,
    },

    AuditSearchBegin { parameters: AuditSearchParameters },
    AuditSearchNext,
    AuditSearchPrevious,

    UserBanCreate { ban: Ban },
    UserBanDelete { user: UserId },
    UserBanGet { user: UserId },
    UserCreate {
        idname: Idname,
        real_name: String,
        email: EmailAddress,
        password: String,
    },
    UserDelete { user: UserId },
    UserEmailAdd { user: UserId, email: EmailAddress },
    UserEmailRemove { user: UserId, email: EmailAddress },
    UserGet { user: UserId },
    UserGetByEmail { email: EmailAddress },
    UserSearchBegin { parameters: UserSearchParameters },
    UserSearchNext,
    UserSearchPrevious,
    UserSearchByEmailBegin { parameters: UserSearchByEmailParameters },
    UserSearchByEmailNext,
    UserSearchByEmailPrevious,
    UserUpdateCredentials {
        user: UserId,
        idname: Option<Idname>,
        real_name: Option<String>,
        password: Option<String>,
    },
}

impl Command {
    /// The command's wire name, for spans and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::AdminBanCreate { .. } => "ADMIN_BAN_CREATE",
            Command::AdminBanDelete { .. } => "ADMIN_BAN_DELETE",
            Command::AdminBanGet { .. } => "ADMIN_BAN_GET",
            Command::AdminCreate { .. } => "ADMIN_CREATE",
            Command::AdminDelete { .. } => "ADMIN_DELETE",
            Command::AdminEmailAdd { .. } => "ADMIN_EMAIL_ADD",
            Command::AdminEmailRemove { .. } => "ADMIN_EMAIL_REMOVE",
            Command::AdminGet { .. } => "ADMIN_GET",
            Command::AdminGetByEmail { .. } => "ADMIN_GET_BY_EMAIL",
            Command::AdminPermissionGrant { .. } => "ADMIN_PERMISSION_GRANT",
            Command::AdminPermissionRevoke { .. } => "ADMIN_PERMISSION_REVOKE",
            Command::AdminSearchBegin { .. } => "ADMIN_SEARCH_BEGIN",
            Command::AdminSearchNext => "ADMIN_SEARCH_NEXT",
            Command::AdminSearchPrevious => "ADMIN_SEARCH_PREVIOUS",
            Command::AdminSearchByEmailBegin { .. } => "ADMIN_SEARCH_BY_EMAIL_BEGIN",
            Command::AdminSearchByEmailNext => "ADMIN_SEARCH_BY_EMAIL_NEXT",
            Command::AdminSearchByEmailPrevious => "ADMIN_SEARCH_BY_EMAIL_PREVIOUS",
            Command::AdminSelf => "ADMIN_SELF",
            Command::AdminUpdateCredentials { .. } => "ADMIN_UPDATE_CREDENTIALS",
            Command::AuditSearchBegin { .. } => "AUDIT_SEARCH_BEGIN",
            Command::AuditSearchNext => "AUDIT_SEARCH_NEXT",
            Command::AuditSearchPrevious => "AUDIT_SEARCH_PREVIOUS",
            Command::UserBanCreate { .. } => "USER_BAN_CREATE",
            Command::UserBanDelete { .. } => "USER_BAN_DELETE",
            Command::UserBanGet { .. } => "USER_BAN_GET",
            Command::UserCreate { .. } => "USER_CREATE",
            Command::UserDelete { .. } => "USER_DELETE",
            Command::UserEmailAdd { .. } => "USER_EMAIL_ADD",
            Command::UserEmailRemove { .. } => "USER_EMAIL_REMOVE",
            Command::UserGet { .. } => "USER_GET",
            Command::UserGetByEmail { .. } => "USER_GET_BY_EMAIL",
            Command::UserSearchBegin { .. } => "USER_SEARCH_BEGIN",
            Command::UserSearchNext => "USER_SEARCH_NEXT",
            Command::UserSearchPrevious => "USER_SEARCH_PREVIOUS",
            Command::UserSearchByEmailBegin { .. } => "USER_SEARCH_BY_EMAIL_BEGIN",
            Command::UserSearchByEmailNext => "USER_SEARCH_BY_EMAIL_NEXT",
            Command::UserSearchByEmailPrevious => "USER_SEARCH_BY_EMAIL_PREVIOUS",
            Command::UserUpdateCredentials { .. } => "USER_UPDATE_CREDENTIALS",
        }
    }
}

/// Every response a command can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Error(ErrorResponse),

    LoggedIn { admin: Admin, token: SessionToken },

    AdminBanCreated { ban: Ban },
    AdminBanDeleted,
    AdminBanFound { ban: Option<Ban> },
    AdminCreated { admin: Admin },
    AdminDeleted,
    AdminFound { admin: Option<Admin> },
    AdminPage { page: Page<AdminSummary> },
    AdminSelf { admin: Admin },
    AdminUpdated { admin: Admin },

    AuditPage { page: Page<AuditEvent> },

    UserBanCreated { ban: Ban },
    UserBanDeleted,
    UserBanFound { ban: Option<Ban> },
    UserCreated { user: User },
    UserDeleted,
    UserFound { user: Option<User> },
    UserPage { page: Page<UserSummary> },
    UserUpdated { user: User },
}

impl Response {
    /// Whether this response reports a failure. The executor rolls the
    /// transaction back for error responses.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}
