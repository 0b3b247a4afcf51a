//! Permission tokens and permission sets.
//!
//! Authorization is capability-based: every protected operation names the
//! [`Permission`] it requires, and the policy engine in [`crate::security`]
//! asks the acting admin's [`PermissionSet`] whether that permission is held.
//!
//! # Implication
//!
//! Permissions form a small static implication relation: each unrestricted
//! write permission implies its `*_SELF` counterpart, so an admin allowed to
//! change anyone's email may also change their own without holding the self
//! variant explicitly. [`PermissionSet::holds`] always consults the closure,
//! never the raw set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// An atomic capability token.
///
/// Wire names are the SCREAMING_SNAKE_CASE renderings, e.g.
/// `ADMIN_WRITE_CREDENTIALS_SELF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Ban and unban administrators, and read their bans
    AdminBan,
    /// Create new administrators
    AdminCreate,
    /// Delete administrators
    AdminDelete,
    /// Read and search administrators
    AdminRead,
    /// Change any administrator's login name, real name or password
    AdminWriteCredentials,
    /// Change one's own login name, real name or password
    AdminWriteCredentialsSelf,
    /// Add and remove email addresses on any administrator
    AdminWriteEmail,
    /// Add and remove one's own email addresses
    AdminWriteEmailSelf,
    /// Grant and revoke permissions on any administrator
    AdminWritePermissions,
    /// Grant and revoke permissions on oneself
    AdminWritePermissionsSelf,
    /// Read and search the audit log
    AuditRead,
    /// Ban and unban users, and read their bans
    UserBan,
    /// Create new users
    UserCreate,
    /// Delete users
    UserDelete,
    /// Read and search users
    UserRead,
    /// Change a user's login name, real name or password
    UserWriteCredentials,
    /// Add and remove email addresses on users
    UserWriteEmail,
}

impl Permission {
    /// Every permission, in `Ord` order.
    pub const ALL: [Permission; 17] = [
        Permission::AdminBan,
        Permission::AdminCreate,
        Permission::AdminDelete,
        Permission::AdminRead,
        Permission::AdminWriteCredentials,
        Permission::AdminWriteCredentialsSelf,
        Permission::AdminWriteEmail,
        Permission::AdminWriteEmailSelf,
        Permission::AdminWritePermissions,
        Permission::AdminWritePermissionsSelf,
        Permission::AuditRead,
        Permission::UserBan,
        Permission::UserCreate,
        Permission::UserDelete,
        Permission::UserRead,
        Permission::UserWriteCredentials,
        Permission::UserWriteEmail,
    ];

    /// The permissions this permission directly implies.
    ///
    /// The full closure is computed by [`PermissionSet::implied`].
    pub fn implies(self) -> &'static [Permission] {
        match self {
            Permission::AdminWriteCredentials => &[Permission::AdminWriteCredentialsSelf],
            Permission::AdminWriteEmail => &[Permission::AdminWriteEmailSelf],
            Permission::AdminWritePermissions => &[Permission::AdminWritePermissionsSelf],
            _ => &[],
        }
    }

    /// The canonical wire name of this permission.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::AdminBan => "ADMIN_BAN",
            Permission::AdminCreate => "ADMIN_CREATE",
            Permission::AdminDelete => "ADMIN_DELETE",
            Permission::AdminRead => "ADMIN_READ",
            Permission::AdminWriteCredentials => "ADMIN_WRITE_CREDENTIALS",
            Permission::AdminWriteCredentialsSelf => "ADMIN_WRITE_CREDENTIALS_SELF",
            Permission::AdminWriteEmail => "ADMIN_WRITE_EMAIL",
            Permission::AdminWriteEmailSelf => "ADMIN_WRITE_EMAIL_SELF",
            Permission::AdminWritePermissions => "ADMIN_WRITE_PERMISSIONS",
            Permission::AdminWritePermissionsSelf => "ADMIN_WRITE_PERMISSIONS_SELF",
            Permission::AuditRead => "AUDIT_READ",
            Permission::UserBan => "USER_BAN",
            Permission::UserCreate => "USER_CREATE",
            Permission::UserDelete => "USER_DELETE",
            Permission::UserRead => "USER_READ",
            Permission::UserWriteCredentials => "USER_WRITE_CREDENTIALS",
            Permission::UserWriteEmail => "USER_WRITE_EMAIL",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == input)
            .ok_or_else(|| UnknownPermission(input.to_string()))
    }
}

/// Error returned when parsing an unrecognized permission name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

/// An immutable set of permissions.
///
/// [`grant`](PermissionSet::grant) and [`revoke`](PermissionSet::revoke)
/// return new sets instead of mutating, so a set held by an [`crate::model::Admin`]
/// value never changes underneath a security check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set holding exactly the given permissions.
    pub fn of<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// The set of every permission. Used for the bootstrap admin.
    pub fn all() -> Self {
        Self::of(Permission::ALL)
    }

    /// A copy of this set with `permission` added.
    #[must_use]
    pub fn grant(&self, permission: Permission) -> Self {
        let mut permissions = self.permissions.clone();
        permissions.insert(permission);
        Self { permissions }
    }

    /// A copy of this set with `permission` removed.
    #[must_use]
    pub fn revoke(&self, permission: Permission) -> Self {
        let mut permissions = self.permissions.clone();
        permissions.remove(&permission);
        Self { permissions }
    }

    /// Whether `permission` is literally a member, ignoring implication.
    pub fn contains(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// The implication closure of this set, computed to fixpoint.
    ///
    /// Idempotent, and always a superset of the input.
    pub fn implied(&self) -> Self {
        let mut closed = self.permissions.clone();
        loop {
            let additions: Vec<Permission> = closed
                .iter()
                .flat_map(|p| p.implies().iter().copied())
                .filter(|p| !closed.contains(p))
                .collect();
            if additions.is_empty() {
                break;
            }
            closed.extend(additions);
        }
        Self { permissions: closed }
    }

    /// Whether this set holds `permission`, taking implication into account.
    pub fn holds(&self, permission: Permission) -> bool {
        self.implied().contains(permission)
    }

    /// Whether this set holds every permission in `other`, taking implication
    /// into account.
    pub fn holds_all(&self, other: &PermissionSet) -> bool {
        let closed = self.implied();
        other.iter().all(|p| closed.contains(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self::of(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for permission in Permission::ALL {
            let parsed: Permission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, permission);

            // serde uses the same names as as_str/FromStr
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
        }
        assert!("ADMIN_EVERYTHING".parse::<Permission>().is_err());
    }

    #[test]
    fn test_closure_is_monotone() {
        for permission in Permission::ALL {
            let set = PermissionSet::of([permission]);
            let implied = set.implied();
            assert!(implied.contains(permission), "{permission} lost by closure");
            assert!(implied.len() >= set.len());
        }
    }

    #[test]
    fn test_closure_is_idempotent() {
        let set = PermissionSet::of([
            Permission::AdminWriteCredentials,
            Permission::AdminWriteEmail,
            Permission::AdminWritePermissions,
            Permission::UserRead,
        ]);
        let once = set.implied();
        let twice = once.implied();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_write_implies_write_self() {
        let set = PermissionSet::of([Permission::AdminWriteCredentials]);
        assert!(set.holds(Permission::AdminWriteCredentialsSelf));
        assert!(!set.contains(Permission::AdminWriteCredentialsSelf));

        let set = PermissionSet::of([Permission::AdminWriteEmail]);
        assert!(set.holds(Permission::AdminWriteEmailSelf));

        let set = PermissionSet::of([Permission::AdminWritePermissions]);
        assert!(set.holds(Permission::AdminWritePermissionsSelf));
    }

    #[test]
    fn test_self_does_not_imply_write() {
        let set = PermissionSet::of([Permission::AdminWriteCredentialsSelf]);
        assert!(!set.holds(Permission::AdminWriteCredentials));
    }

    #[test]
    fn test_grant_and_revoke_are_value_operations() {
        let empty = PermissionSet::empty();
        let granted = empty.grant(Permission::AdminRead);

        assert!(empty.is_empty());
        assert!(granted.holds(Permission::AdminRead));

        let revoked = granted.revoke(Permission::AdminRead);
        assert!(granted.holds(Permission::AdminRead));
        assert!(!revoked.holds(Permission::AdminRead));
    }

    #[test]
    fn test_holds_all_uses_closure() {
        let holder = PermissionSet::of([Permission::AdminWriteEmail, Permission::AdminRead]);
        let wanted = PermissionSet::of([Permission::AdminWriteEmailSelf, Permission::AdminRead]);
        assert!(holder.holds_all(&wanted));

        let too_much = wanted.grant(Permission::AdminDelete);
        assert!(!holder.holds_all(&too_much));
    }

    #[test]
    fn test_set_serializes_as_sequence() {
        let set = PermissionSet::of([Permission::AuditRead, Permission::AdminBan]);
        let json = serde_json::to_string(&set).unwrap();
        // BTreeSet ordering puts ADMIN_BAN first
        assert_eq!(json, "[\"ADMIN_BAN\",\"AUDIT_READ\"]");

        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
