//! Store traits for identity data.
//!
//! Command handlers run against these traits rather than a concrete store.
//! [`PgStore`](crate::db::postgres::PgStore) implements them over a Postgres
//! transaction; the in-memory store in [`crate::test_utils`] implements them
//! for tests. [`IdentityStore`] bundles the lot so handler signatures stay
//! readable, and [`StoreTransaction`] adds the commit/rollback pair the
//! executor drives.

use crate::db::errors::{DbError, Result};
use crate::model::{
    Admin, AdminSummary, AdminUpdate, AuditEvent, AuditEventCreate, Ban, EmailAddress, Idname, User, UserSummary,
    UserUpdate,
};
use crate::search::{
    AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters, Page, UserSearchByEmailParameters,
    UserSearchParameters,
};
use crate::types::{AdminId, UserId};
use async_trait::async_trait;

/// Queries over administrator accounts.
#[async_trait]
pub trait AdminsQueries {
    /// Stores a fully formed admin. The caller supplies the id and
    /// timestamps.
    async fn admin_create(&mut self, admin: &Admin) -> Result<()>;

    async fn admin_get(&mut self, id: AdminId) -> Result<Option<Admin>>;

    /// Like [`admin_get`](AdminsQueries::admin_get), but absence is an error.
    async fn admin_get_require(&mut self, id: AdminId) -> Result<Admin>
    where
        Self: Send,
    {
        self.admin_get(id).await?.ok_or(DbError::AdminNonexistent { id })
    }

    async fn admin_get_by_idname(&mut self, idname: &Idname) -> Result<Option<Admin>>;

    async fn admin_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<Admin>>;

    /// Applies a partial update and returns the stored result.
    ///
    /// Fails with [`DbError::AdminNonexistent`] when there is nothing to
    /// update.
    async fn admin_update(&mut self, id: AdminId, update: &AdminUpdate) -> Result<Admin>;

    async fn admin_delete(&mut self, id: AdminId) -> Result<()>;

    async fn admin_email_add(&mut self, id: AdminId, email: &EmailAddress) -> Result<()>;

    async fn admin_email_remove(&mut self, id: AdminId, email: &EmailAddress) -> Result<()>;

    /// Creates or replaces the ban on `ban.target`.
    async fn admin_ban_create(&mut self, ban: &Ban) -> Result<()>;

    async fn admin_ban_get(&mut self, id: AdminId) -> Result<Option<Ban>>;

    /// Removes the ban on `ban.target`. A missing ban is not an error.
    async fn admin_ban_delete(&mut self, ban: &Ban) -> Result<()>;

    /// Total number of admins, used for bootstrap detection.
    async fn admin_count(&mut self) -> Result<u64>;
}

/// Queries over user accounts. Mirrors [`AdminsQueries`] minus permissions.
#[async_trait]
pub trait UsersQueries {
    async fn user_create(&mut self, user: &User) -> Result<()>;

    async fn user_get(&mut self, id: UserId) -> Result<Option<User>>;

    async fn user_get_require(&mut self, id: UserId) -> Result<User>
    where
        Self: Send,
    {
        self.user_get(id).await?.ok_or(DbError::UserNonexistent { id })
    }

    async fn user_get_by_idname(&mut self, idname: &Idname) -> Result<Option<User>>;

    async fn user_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>>;

    async fn user_update(&mut self, id: UserId, update: &UserUpdate) -> Result<User>;

    async fn user_delete(&mut self, id: UserId) -> Result<()>;

    async fn user_email_add(&mut self, id: UserId, email: &EmailAddress) -> Result<()>;

    async fn user_email_remove(&mut self, id: UserId, email: &EmailAddress) -> Result<()>;

    async fn user_ban_create(&mut self, ban: &Ban) -> Result<()>;

    async fn user_ban_get(&mut self, id: UserId) -> Result<Option<Ban>>;

    async fn user_ban_delete(&mut self, ban: &Ban) -> Result<()>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditQueries {
    async fn audit_put(&mut self, event: &AuditEventCreate) -> Result<()>;
}

/// One page of a search, for one parameter type.
///
/// The implementation clamps `page_index` into the range of pages that exist
/// for the current data, so callers always get a real page back.
#[async_trait]
pub trait SearchQueries<P> {
    type Item;

    async fn search_page(&mut self, parameters: &P, page_index: u32) -> Result<Page<Self::Item>>;
}

/// Everything a command handler may ask of the store.
pub trait IdentityStore:
    AdminsQueries
    + UsersQueries
    + AuditQueries
    + SearchQueries<AdminSearchParameters, Item = AdminSummary>
    + SearchQueries<AdminSearchByEmailParameters, Item = AdminSummary>
    + SearchQueries<UserSearchParameters, Item = UserSummary>
    + SearchQueries<UserSearchByEmailParameters, Item = UserSummary>
    + SearchQueries<AuditSearchParameters, Item = AuditEvent>
    + Send
{
}

impl<S> IdentityStore for S where
    S: AdminsQueries
        + UsersQueries
        + AuditQueries
        + SearchQueries<AdminSearchParameters, Item = AdminSummary>
        + SearchQueries<AdminSearchByEmailParameters, Item = AdminSummary>
        + SearchQueries<UserSearchParameters, Item = UserSummary>
        + SearchQueries<UserSearchByEmailParameters, Item = UserSummary>
        + SearchQueries<AuditSearchParameters, Item = AuditEvent>
        + Send
{
}

/// An [`IdentityStore`] scoped to one transaction.
#[async_trait]
pub trait StoreTransaction: IdentityStore {
    /// Makes the transaction's writes durable.
    async fn commit(self) -> Result<()>;

    /// Discards the transaction's writes.
    async fn rollback(self) -> Result<()>;
}
