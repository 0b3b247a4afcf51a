//! Per-session search state.

use crate::search::cursor::SearchCursor;
use crate::search::params::{
    AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters,
    UserSearchByEmailParameters, UserSearchParameters,
};

/// The search cursors belonging to one login session.
///
/// Each kind of search has its own slot, so an admin can page through an
/// admin search and an audit search at the same time without the two
/// interfering. Beginning a search replaces whatever cursor was in its slot;
/// the other slots are untouched.
#[derive(Debug, Default)]
pub struct SearchSession {
    admins: Option<SearchCursor<AdminSearchParameters>>,
    admins_by_email: Option<SearchCursor<AdminSearchByEmailParameters>>,
    users: Option<SearchCursor<UserSearchParameters>>,
    users_by_email: Option<SearchCursor<UserSearchByEmailParameters>>,
    audit: Option<SearchCursor<AuditSearchParameters>>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_admins(&mut self, parameters: AdminSearchParameters) -> &mut SearchCursor<AdminSearchParameters> {
        self.admins.insert(SearchCursor::new(parameters))
    }

    pub fn admins(&mut self) -> Option<&mut SearchCursor<AdminSearchParameters>> {
        self.admins.as_mut()
    }

    pub fn begin_admins_by_email(
        &mut self,
        parameters: AdminSearchByEmailParameters,
    ) -> &mut SearchCursor<AdminSearchByEmailParameters> {
        self.admins_by_email.insert(SearchCursor::new(parameters))
    }

    pub fn admins_by_email(&mut self) -> Option<&mut SearchCursor<AdminSearchByEmailParameters>> {
        self.admins_by_email.as_mut()
    }

    pub fn begin_users(&mut self, parameters: UserSearchParameters) -> &mut SearchCursor<UserSearchParameters> {
        self.users.insert(SearchCursor::new(parameters))
    }

    pub fn users(&mut self) -> Option<&mut SearchCursor<UserSearchParameters>> {
        self.users.as_mut()
    }

    pub fn begin_users_by_email(
        &mut self,
        parameters: UserSearchByEmailParameters,
    ) -> &mut SearchCursor<UserSearchByEmailParameters> {
        self.users_by_email.insert(SearchCursor::new(parameters))
    }

    pub fn users_by_email(&mut self) -> Option<&mut SearchCursor<UserSearchByEmailParameters>> {
        self.users_by_email.as_mut()
    }

    pub fn begin_audit(&mut self, parameters: AuditSearchParameters) -> &mut SearchCursor<AuditSearchParameters> {
        self.audit.insert(SearchCursor::new(parameters))
    }

    pub fn audit(&mut self) -> Option<&mut SearchCursor<AuditSearchParameters>> {
        self.audit.as_mut()
    }

    /// Drops every cursor. Used when a session ends.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
