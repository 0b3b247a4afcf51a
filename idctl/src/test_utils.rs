//! Test support: an in-memory store and small fixtures.
//!
//! [`MemoryStore`] implements the full store surface against shared
//! in-memory state, so command and search behavior can be exercised without
//! a database. Writes apply immediately; commit and rollback are recorded as
//! counters rather than isolating anything, which is enough to assert the
//! executor's transaction discipline. Every mutation and search is recorded
//! as a [`StoreCall`] for tests that care about exactly what reached the
//! store.

use crate::clock::Clock;
use crate::db::{AdminsQueries, AuditQueries, DbError, Result, SearchQueries, StoreTransaction, UsersQueries};
use crate::model::{
    Admin, AdminSummary, AdminUpdate, AuditEvent, AuditEventCreate, Ban, EmailAddress, Idname, PasswordRecord,
    PermissionSet, User, UserSummary, UserUpdate,
};
use crate::search::{
    AdminColumn, AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters, ColumnOrdering, Page,
    PagePlan, UserColumn, UserSearchByEmailParameters, UserSearchParameters,
};
use crate::types::{AdminId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// An admin with the given name and permissions. The password record is not
/// verifiable; tests that log in replace it with a real one.
pub fn admin_fixture(idname: &str, permissions: PermissionSet) -> Admin {
    let now = Utc::now();
    Admin {
        id: Uuid::new_v4(),
        idname: idname.parse().unwrap(),
        real_name: format!("Admin {idname}"),
        emails: vec![format!("{idname}@example.com").parse().unwrap()],
        time_created: now,
        time_updated: now,
        password: PasswordRecord { hash: "$argon2id$unusable".to_string(), expires: None },
        permissions,
    }
}

/// A user with the given name, mirroring [`admin_fixture`].
pub fn user_fixture(idname: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        idname: idname.parse().unwrap(),
        real_name: format!("User {idname}"),
        emails: vec![format!("{idname}@example.com").parse().unwrap()],
        time_created: now,
        time_updated: now,
        password: PasswordRecord { hash: "$argon2id$unusable".to_string(), expires: None },
    }
}

/// One mutation or search that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    AdminCreate(AdminId),
    AdminUpdate(AdminId),
    AdminDelete(AdminId),
    AdminEmailAdd(AdminId, EmailAddress),
    AdminEmailRemove(AdminId, EmailAddress),
    AdminBanCreate(Ban),
    AdminBanDelete(Ban),
    UserCreate(UserId),
    UserUpdate(UserId),
    UserDelete(UserId),
    UserEmailAdd(UserId, EmailAddress),
    UserEmailRemove(UserId, EmailAddress),
    UserBanCreate(Ban),
    UserBanDelete(Ban),
    AuditPut { event_type: String },
    AdminSearch { limit: u32, page_index: u32 },
    AdminSearchByEmail { limit: u32, page_index: u32 },
    UserSearch { limit: u32, page_index: u32 },
    UserSearchByEmail { limit: u32, page_index: u32 },
    AuditSearch { limit: u32, page_index: u32 },
}

#[derive(Debug, Default)]
struct MemoryState {
    admins: Vec<Admin>,
    users: Vec<User>,
    admin_bans: HashMap<AdminId, Ban>,
    user_bans: HashMap<UserId, Ban>,
    audit: Vec<AuditEvent>,
    next_audit_id: i64,
    calls: Vec<StoreCall>,
    committed: u32,
    rolled_back: u32,
}

/// The in-memory store. Clones share state, so a test can hand a clone to
/// the executor as the transaction and keep one for assertions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_admin(&self, admin: Admin) {
        self.state.lock().unwrap().admins.push(admin);
    }

    pub fn seed_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn seed_admin_ban(&self, ban: Ban) {
        self.state.lock().unwrap().admin_bans.insert(ban.target, ban);
    }

    pub fn seed_user_ban(&self, ban: Ban) {
        self.state.lock().unwrap().user_bans.insert(ban.target, ban);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn committed(&self) -> u32 {
        self.state.lock().unwrap().committed
    }

    pub fn rolled_back(&self) -> u32 {
        self.state.lock().unwrap().rolled_back
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.lock().unwrap().audit.clone()
    }

    pub fn admin_snapshot(&self, id: AdminId) -> Option<Admin> {
        self.state.lock().unwrap().admins.iter().find(|a| a.id == id).cloned()
    }

    pub fn user_snapshot(&self, id: UserId) -> Option<User> {
        self.state.lock().unwrap().users.iter().find(|u| u.id == id).cloned()
    }
}

fn unique(constraint: &str, table: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

fn name_taken(existing: &[impl HasIdname], idname: &Idname, not_id: Uuid) -> bool {
    existing
        .iter()
        .any(|a| a.id() != not_id && a.idname().as_str().eq_ignore_ascii_case(idname.as_str()))
}

trait HasIdname {
    fn id(&self) -> Uuid;
    fn idname(&self) -> &Idname;
}

impl HasIdname for Admin {
    fn id(&self) -> Uuid {
        self.id
    }
    fn idname(&self) -> &Idname {
        &self.idname
    }
}

impl HasIdname for User {
    fn id(&self) -> Uuid {
        self.id
    }
    fn idname(&self) -> &Idname {
        &self.idname
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn page_slice<T: Clone>(matches: &[T], plan: &PagePlan, limit: u32) -> Vec<T> {
    let start = usize::try_from(plan.offset).unwrap_or(usize::MAX).min(matches.len());
    let end = start.saturating_add(limit as usize).min(matches.len());
    matches[start..end].to_vec()
}

fn order_admins(matches: &mut [Admin], ordering: &ColumnOrdering<AdminColumn>) {
    match ordering.column {
        AdminColumn::ById => matches.sort_by_key(|a| a.id),
        AdminColumn::ByIdname => matches.sort_by(|x, y| x.idname.as_str().cmp(y.idname.as_str())),
        AdminColumn::ByRealName => matches.sort_by(|x, y| x.real_name.cmp(&y.real_name)),
        AdminColumn::ByTimeCreated => matches.sort_by_key(|a| a.time_created),
        AdminColumn::ByTimeUpdated => matches.sort_by_key(|a| a.time_updated),
    }
    if !ordering.ascending {
        matches.reverse();
    }
}

fn order_users(matches: &mut [User], ordering: &ColumnOrdering<UserColumn>) {
    match ordering.column {
        UserColumn::ById => matches.sort_by_key(|u| u.id),
        UserColumn::ByIdname => matches.sort_by(|x, y| x.idname.as_str().cmp(y.idname.as_str())),
        UserColumn::ByRealName => matches.sort_by(|x, y| x.real_name.cmp(&y.real_name)),
        UserColumn::ByTimeCreated => matches.sort_by_key(|u| u.time_created),
        UserColumn::ByTimeUpdated => matches.sort_by_key(|u| u.time_updated),
    }
    if !ordering.ascending {
        matches.reverse();
    }
}

#[async_trait]
impl AdminsQueries for MemoryStore {
    async fn admin_create(&mut self, admin: &Admin) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminCreate(admin.id));
        if name_taken(&state.admins, &admin.idname, admin.id) {
            return Err(unique("admins_idname_unique", "admins"));
        }
        let taken = state
            .admins
            .iter()
            .flat_map(|a| a.emails.iter())
            .any(|email| admin.emails.contains(email));
        if taken {
            return Err(unique("admin_emails_email_unique", "admin_emails"));
        }
        state.admins.push(admin.clone());
        Ok(())
    }

    async fn admin_get(&mut self, id: AdminId) -> Result<Option<Admin>> {
        Ok(self.admin_snapshot(id))
    }

    async fn admin_get_by_idname(&mut self, idname: &Idname) -> Result<Option<Admin>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .admins
            .iter()
            .find(|a| a.idname.as_str().eq_ignore_ascii_case(idname.as_str()))
            .cloned())
    }

    async fn admin_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<Admin>> {
        let state = self.state.lock().unwrap();
        Ok(state.admins.iter().find(|a| a.emails.contains(email)).cloned())
    }

    async fn admin_update(&mut self, id: AdminId, update: &AdminUpdate) -> Result<Admin> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminUpdate(id));
        let admin = state
            .admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DbError::AdminNonexistent { id })?;
        if let Some(idname) = &update.idname {
            admin.idname = idname.clone();
        }
        if let Some(real_name) = &update.real_name {
            admin.real_name = real_name.clone();
        }
        if let Some(password) = &update.password {
            admin.password = password.clone();
        }
        if let Some(permissions) = &update.permissions {
            admin.permissions = permissions.clone();
        }
        admin.time_updated = update.time_updated;
        Ok(admin.clone())
    }

    async fn admin_delete(&mut self, id: AdminId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminDelete(id));
        let before = state.admins.len();
        state.admins.retain(|a| a.id != id);
        if state.admins.len() == before {
            return Err(DbError::AdminNonexistent { id });
        }
        state.admin_bans.remove(&id);
        Ok(())
    }

    async fn admin_email_add(&mut self, id: AdminId, email: &EmailAddress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminEmailAdd(id, email.clone()));
        let taken = state.admins.iter().any(|a| a.emails.contains(email));
        if taken {
            return Err(unique("admin_emails_email_unique", "admin_emails"));
        }
        let admin = state
            .admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DbError::AdminNonexistent { id })?;
        admin.emails.push(email.clone());
        admin.emails.sort();
        Ok(())
    }

    async fn admin_email_remove(&mut self, id: AdminId, email: &EmailAddress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminEmailRemove(id, email.clone()));
        let admin = state
            .admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DbError::AdminNonexistent { id })?;
        admin.emails.retain(|e| e != email);
        Ok(())
    }

    async fn admin_ban_create(&mut self, ban: &Ban) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminBanCreate(ban.clone()));
        state.admin_bans.insert(ban.target, ban.clone());
        Ok(())
    }

    async fn admin_ban_get(&mut self, id: AdminId) -> Result<Option<Ban>> {
        Ok(self.state.lock().unwrap().admin_bans.get(&id).cloned())
    }

    async fn admin_ban_delete(&mut self, ban: &Ban) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AdminBanDelete(ban.clone()));
        state.admin_bans.remove(&ban.target);
        Ok(())
    }

    async fn admin_count(&mut self) -> Result<u64> {
        Ok(self.state.lock().unwrap().admins.len() as u64)
    }
}

#[async_trait]
impl UsersQueries for MemoryStore {
    async fn user_create(&mut self, user: &User) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserCreate(user.id));
        if name_taken(&state.users, &user.idname, user.id) {
            return Err(unique("users_idname_unique", "users"));
        }
        let taken = state
            .users
            .iter()
            .flat_map(|u| u.emails.iter())
            .any(|email| user.emails.contains(email));
        if taken {
            return Err(unique("user_emails_email_unique", "user_emails"));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn user_get(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.user_snapshot(id))
    }

    async fn user_get_by_idname(&mut self, idname: &Idname) -> Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.idname.as_str().eq_ignore_ascii_case(idname.as_str()))
            .cloned())
    }

    async fn user_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.emails.contains(email)).cloned())
    }

    async fn user_update(&mut self, id: UserId, update: &UserUpdate) -> Result<User> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserUpdate(id));
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DbError::UserNonexistent { id })?;
        if let Some(idname) = &update.idname {
            user.idname = idname.clone();
        }
        if let Some(real_name) = &update.real_name {
            user.real_name = real_name.clone();
        }
        if let Some(password) = &update.password {
            user.password = password.clone();
        }
        user.time_updated = update.time_updated;
        Ok(user.clone())
    }

    async fn user_delete(&mut self, id: UserId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserDelete(id));
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(DbError::UserNonexistent { id });
        }
        state.user_bans.remove(&id);
        Ok(())
    }

    async fn user_email_add(&mut self, id: UserId, email: &EmailAddress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserEmailAdd(id, email.clone()));
        let taken = state.users.iter().any(|u| u.emails.contains(email));
        if taken {
            return Err(unique("user_emails_email_unique", "user_emails"));
        }
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DbError::UserNonexistent { id })?;
        user.emails.push(email.clone());
        user.emails.sort();
        Ok(())
    }

    async fn user_email_remove(&mut self, id: UserId, email: &EmailAddress) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserEmailRemove(id, email.clone()));
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DbError::UserNonexistent { id })?;
        user.emails.retain(|e| e != email);
        Ok(())
    }

    async fn user_ban_create(&mut self, ban: &Ban) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserBanCreate(ban.clone()));
        state.user_bans.insert(ban.target, ban.clone());
        Ok(())
    }

    async fn user_ban_get(&mut self, id: UserId) -> Result<Option<Ban>> {
        Ok(self.state.lock().unwrap().user_bans.get(&id).cloned())
    }

    async fn user_ban_delete(&mut self, ban: &Ban) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UserBanDelete(ban.clone()));
        state.user_bans.remove(&ban.target);
        Ok(())
    }
}

#[async_trait]
impl AuditQueries for MemoryStore {
    async fn audit_put(&mut self, event: &AuditEventCreate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::AuditPut { event_type: event.event_type.clone() });
        state.next_audit_id += 1;
        let id = state.next_audit_id;
        state.audit.push(AuditEvent {
            id,
            time: event.time,
            owner: event.owner,
            event_type: event.event_type.clone(),
            message: event.message.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl SearchQueries<AdminSearchParameters> for MemoryStore {
    type Item = AdminSummary;

    async fn search_page(&mut self, parameters: &AdminSearchParameters, page_index: u32) -> Result<Page<AdminSummary>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(StoreCall::AdminSearch { limit: parameters.limit.get(), page_index });

        let mut matches: Vec<Admin> = state
            .admins
            .iter()
            .filter(|a| {
                parameters.time_created_range.contains(a.time_created)
                    && parameters.time_updated_range.contains(a.time_updated)
                    && parameters.query.as_deref().is_none_or(|q| {
                        contains_ci(a.idname.as_str(), q) || contains_ci(&a.real_name, q)
                    })
            })
            .cloned()
            .collect();
        order_admins(&mut matches, &parameters.ordering);

        let plan = PagePlan::locate(matches.len() as u64, parameters.limit, page_index);
        let items = page_slice(&matches, &plan, parameters.limit.get());
        Ok(Page::from_plan(items, plan).map(|a| AdminSummary::of(&a)))
    }
}

#[async_trait]
impl SearchQueries<AdminSearchByEmailParameters> for MemoryStore {
    type Item = AdminSummary;

    async fn search_page(
        &mut self,
        parameters: &AdminSearchByEmailParameters,
        page_index: u32,
    ) -> Result<Page<AdminSummary>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(StoreCall::AdminSearchByEmail { limit: parameters.limit.get(), page_index });

        let mut matches: Vec<Admin> = state
            .admins
            .iter()
            .filter(|a| {
                parameters.time_created_range.contains(a.time_created)
                    && parameters.time_updated_range.contains(a.time_updated)
                    && a.emails.iter().any(|e| contains_ci(e.as_str(), &parameters.search))
            })
            .cloned()
            .collect();
        order_admins(&mut matches, &parameters.ordering);

        let plan = PagePlan::locate(matches.len() as u64, parameters.limit, page_index);
        let items = page_slice(&matches, &plan, parameters.limit.get());
        Ok(Page::from_plan(items, plan).map(|a| AdminSummary::of(&a)))
    }
}

#[async_trait]
impl SearchQueries<UserSearchParameters> for MemoryStore {
    type Item = UserSummary;

    async fn search_page(&mut self, parameters: &UserSearchParameters, page_index: u32) -> Result<Page<UserSummary>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(StoreCall::UserSearch { limit: parameters.limit.get(), page_index });

        let mut matches: Vec<User> = state
            .users
            .iter()
            .filter(|u| {
                parameters.time_created_range.contains(u.time_created)
                    && parameters.time_updated_range.contains(u.time_updated)
                    && parameters.query.as_deref().is_none_or(|q| {
                        contains_ci(u.idname.as_str(), q) || contains_ci(&u.real_name, q)
                    })
            })
            .cloned()
            .collect();
        order_users(&mut matches, &parameters.ordering);

        let plan = PagePlan::locate(matches.len() as u64, parameters.limit, page_index);
        let items = page_slice(&matches, &plan, parameters.limit.get());
        Ok(Page::from_plan(items, plan).map(|u| UserSummary::of(&u)))
    }
}

#[async_trait]
impl SearchQueries<UserSearchByEmailParameters> for MemoryStore {
    type Item = UserSummary;

    async fn search_page(
        &mut self,
        parameters: &UserSearchByEmailParameters,
        page_index: u32,
    ) -> Result<Page<UserSummary>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(StoreCall::UserSearchByEmail { limit: parameters.limit.get(), page_index });

        let mut matches: Vec<User> = state
            .users
            .iter()
            .filter(|u| {
                parameters.time_created_range.contains(u.time_created)
                    && parameters.time_updated_range.contains(u.time_updated)
                    && u.emails.iter().any(|e| contains_ci(e.as_str(), &parameters.search))
            })
            .cloned()
            .collect();
        order_users(&mut matches, &parameters.ordering);

        let plan = PagePlan::locate(matches.len() as u64, parameters.limit, page_index);
        let items = page_slice(&matches, &plan, parameters.limit.get());
        Ok(Page::from_plan(items, plan).map(|u| UserSummary::of(&u)))
    }
}

#[async_trait]
impl SearchQueries<AuditSearchParameters> for MemoryStore {
    type Item = AuditEvent;

    async fn search_page(&mut self, parameters: &AuditSearchParameters, page_index: u32) -> Result<Page<AuditEvent>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(StoreCall::AuditSearch { limit: parameters.limit.get(), page_index });

        let mut matches: Vec<AuditEvent> = state
            .audit
            .iter()
            .filter(|e| {
                parameters.time_range.contains(e.time)
                    && parameters.owner.as_deref().is_none_or(|o| contains_ci(&e.owner.to_string(), o))
                    && parameters.event_type.as_deref().is_none_or(|t| contains_ci(&e.event_type, t))
                    && parameters.message.as_deref().is_none_or(|m| contains_ci(&e.message, m))
            })
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.id);

        let plan = PagePlan::locate(matches.len() as u64, parameters.limit, page_index);
        let items = page_slice(&matches, &plan, parameters.limit.get());
        Ok(Page::from_plan(items, plan))
    }
}

#[async_trait]
impl StoreTransaction for MemoryStore {
    async fn commit(self) -> Result<()> {
        self.state.lock().unwrap().committed += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.state.lock().unwrap().rolled_back += 1;
        Ok(())
    }
}
