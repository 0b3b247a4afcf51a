//! The security policy for admin commands.
//!
//! Every protected command maps to one [`SecurityAction`]; [`check`] decides
//! whether the acting admin may perform it. The policy is pure: it looks only
//! at the admin value and the action, never at the store, so a denial costs
//! nothing and cannot fail.
//!
//! Three rules beyond plain permission membership:
//!
//! * Writes aimed at the acting admin's own account need only the `*_SELF`
//!   variant of the relevant write permission. The unrestricted variant
//!   implies the self variant, so holders of the former pass both cases.
//! * Permissions can only be granted or revoked by an admin who holds the
//!   permission in question, whoever the target is.
//! * A new admin's initial permissions must be a subset of what the creating
//!   admin holds (under implication).
//!
//! `LOGIN` and `ADMIN_SELF` have no action here; they are open to any
//! authenticated admin.

use crate::model::{Admin, Permission, PermissionSet};
use crate::types::AdminId;

/// The outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied, with a reason fit for returning to the client.
    Denied { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    fn denied(reason: impl Into<String>) -> Self {
        Decision::Denied { reason: reason.into() }
    }
}

/// A protected operation, carrying whatever the policy needs to judge it.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityAction {
    AdminBanCreate,
    AdminBanDelete,
    AdminBanGet,
    /// Creating an admin that will start with `grants`.
    AdminCreate { grants: PermissionSet },
    AdminDelete,
    AdminEmailAdd { target: AdminId },
    AdminEmailRemove { target: AdminId },
    AdminPermissionGrant { target: AdminId, permission: Permission },
    AdminPermissionRevoke { target: AdminId, permission: Permission },
    AdminRead,
    AdminUpdateCredentials { target: AdminId },
    AuditRead,
    UserBanCreate,
    UserBanDelete,
    UserBanGet,
    UserCreate,
    UserDelete,
    UserEmailAdd,
    UserEmailRemove,
    UserRead,
    UserUpdateCredentials,
}

/// Decides whether `admin` may perform `action`.
pub fn check(admin: &Admin, action: &SecurityAction) -> Decision {
    match action {
        SecurityAction::AdminBanCreate | SecurityAction::AdminBanDelete | SecurityAction::AdminBanGet => {
            require(admin, Permission::AdminBan)
        }

        SecurityAction::AdminCreate { grants } => {
            let base = require(admin, Permission::AdminCreate);
            if !base.is_allowed() {
                return base;
            }
            if admin.permissions.holds_all(grants) {
                Decision::Allowed
            } else {
                Decision::denied("An admin cannot be created with permissions the creating admin does not hold.")
            }
        }

        SecurityAction::AdminDelete => require(admin, Permission::AdminDelete),

        SecurityAction::AdminEmailAdd { target } | SecurityAction::AdminEmailRemove { target } => require_self_or(
            admin,
            *target,
            Permission::AdminWriteEmailSelf,
            Permission::AdminWriteEmail,
        ),

        SecurityAction::AdminPermissionGrant { target, permission } => {
            let base = require_self_or(
                admin,
                *target,
                Permission::AdminWritePermissionsSelf,
                Permission::AdminWritePermissions,
            );
            if !base.is_allowed() {
                return base;
            }
            if admin.permissions.holds(*permission) {
                Decision::Allowed
            } else {
                Decision::denied(format!(
                    "The {permission} permission cannot be granted by an admin that does not hold it."
                ))
            }
        }

        SecurityAction::AdminPermissionRevoke { target, permission } => {
            let base = require_self_or(
                admin,
                *target,
                Permission::AdminWritePermissionsSelf,
                Permission::AdminWritePermissions,
            );
            if !base.is_allowed() {
                return base;
            }
            if admin.permissions.holds(*permission) {
                Decision::Allowed
            } else {
                Decision::denied(format!(
                    "The {permission} permission cannot be revoked by an admin that does not hold it."
                ))
            }
        }

        SecurityAction::AdminRead => require(admin, Permission::AdminRead),

        SecurityAction::AdminUpdateCredentials { target } => require_self_or(
            admin,
            *target,
            Permission::AdminWriteCredentialsSelf,
            Permission::AdminWriteCredentials,
        ),

        SecurityAction::AuditRead => require(admin, Permission::AuditRead),

        SecurityAction::UserBanCreate | SecurityAction::UserBanDelete | SecurityAction::UserBanGet => {
            require(admin, Permission::UserBan)
        }

        SecurityAction::UserCreate => require(admin, Permission::UserCreate),
        SecurityAction::UserDelete => require(admin, Permission::UserDelete),

        SecurityAction::UserEmailAdd | SecurityAction::UserEmailRemove => require(admin, Permission::UserWriteEmail),

        SecurityAction::UserRead => require(admin, Permission::UserRead),
        SecurityAction::UserUpdateCredentials => require(admin, Permission::UserWriteCredentials),
    }
}

fn require(admin: &Admin, permission: Permission) -> Decision {
    if admin.permissions.holds(permission) {
        Decision::Allowed
    } else {
        Decision::denied(format!("The operation requires the {permission} permission."))
    }
}

/// Requires `on_self` when the target is the acting admin, `on_others`
/// otherwise.
fn require_self_or(admin: &Admin, target: AdminId, on_self: Permission, on_others: Permission) -> Decision {
    if target == admin.id {
        require(admin, on_self)
    } else {
        require(admin, on_others)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordRecord;
    use chrono::Utc;
    use uuid::Uuid;

    fn admin_with(permissions: PermissionSet) -> Admin {
        let now = Utc::now();
        Admin {
            id: Uuid::new_v4(),
            idname: "zeppo".parse().unwrap(),
            real_name: "Zeppo".to_string(),
            emails: Vec::new(),
            time_created: now,
            time_updated: now,
            password: PasswordRecord {
                hash: "$argon2id$unused".to_string(),
                expires: None,
            },
            permissions,
        }
    }

    fn reason_of(decision: Decision) -> String {
        match decision {
            Decision::Allowed => panic!("expected a denial"),
            Decision::Denied { reason } => reason,
        }
    }

    #[test]
    fn test_plain_actions_map_to_their_permissions() {
        let cases = [
            (SecurityAction::AdminBanCreate, Permission::AdminBan),
            (SecurityAction::AdminBanDelete, Permission::AdminBan),
            (SecurityAction::AdminBanGet, Permission::AdminBan),
            (SecurityAction::AdminDelete, Permission::AdminDelete),
            (SecurityAction::AdminRead, Permission::AdminRead),
            (SecurityAction::AuditRead, Permission::AuditRead),
            (SecurityAction::UserBanCreate, Permission::UserBan),
            (SecurityAction::UserBanDelete, Permission::UserBan),
            (SecurityAction::UserBanGet, Permission::UserBan),
            (SecurityAction::UserCreate, Permission::UserCreate),
            (SecurityAction::UserDelete, Permission::UserDelete),
            (SecurityAction::UserEmailAdd, Permission::UserWriteEmail),
            (SecurityAction::UserEmailRemove, Permission::UserWriteEmail),
            (SecurityAction::UserRead, Permission::UserRead),
            (SecurityAction::UserUpdateCredentials, Permission::UserWriteCredentials),
        ];

        for (action, permission) in cases {
            let holder = admin_with(PermissionSet::of([permission]));
            assert!(check(&holder, &action).is_allowed(), "{permission} holder denied");

            let missing = admin_with(PermissionSet::all().revoke(permission));
            let reason = reason_of(check(&missing, &action));
            assert!(reason.contains(permission.as_str()), "reason {reason:?} does not name {permission}");
        }
    }

    #[test]
    fn test_email_writes_follow_self_discipline() {
        let holder = admin_with(PermissionSet::of([Permission::AdminWriteEmailSelf]));

        let on_self = SecurityAction::AdminEmailAdd { target: holder.id };
        assert!(check(&holder, &on_self).is_allowed());

        let on_other = SecurityAction::AdminEmailAdd { target: Uuid::new_v4() };
        let reason = reason_of(check(&holder, &on_other));
        assert!(reason.contains("ADMIN_WRITE_EMAIL"));

        // The unrestricted permission covers both directions.
        let unrestricted = admin_with(PermissionSet::of([Permission::AdminWriteEmail]));
        assert!(check(&unrestricted, &SecurityAction::AdminEmailRemove { target: unrestricted.id }).is_allowed());
        assert!(check(&unrestricted, &SecurityAction::AdminEmailRemove { target: Uuid::new_v4() }).is_allowed());
    }

    #[test]
    fn test_credential_writes_follow_self_discipline() {
        let holder = admin_with(PermissionSet::of([Permission::AdminWriteCredentialsSelf]));

        assert!(check(&holder, &SecurityAction::AdminUpdateCredentials { target: holder.id }).is_allowed());
        assert!(!check(&holder, &SecurityAction::AdminUpdateCredentials { target: Uuid::new_v4() }).is_allowed());
    }

    #[test]
    fn test_admin_creation_grants_must_be_held() {
        let creator = admin_with(PermissionSet::of([Permission::AdminCreate, Permission::AdminRead]));

        let subset = SecurityAction::AdminCreate {
            grants: PermissionSet::of([Permission::AdminRead]),
        };
        assert!(check(&creator, &subset).is_allowed());

        let superset = SecurityAction::AdminCreate {
            grants: PermissionSet::of([Permission::AdminDelete]),
        };
        assert!(!check(&creator, &superset).is_allowed());

        // Implication counts: holding the unrestricted write lets the
        // creator grant the self variant.
        let writer = admin_with(PermissionSet::of([Permission::AdminCreate, Permission::AdminWriteEmail]));
        let implied = SecurityAction::AdminCreate {
            grants: PermissionSet::of([Permission::AdminWriteEmailSelf]),
        };
        assert!(check(&writer, &implied).is_allowed());
    }

    #[test]
    fn test_admin_creation_requires_the_create_permission_first() {
        let no_create = admin_with(PermissionSet::of([Permission::AdminRead]));
        let action = SecurityAction::AdminCreate {
            grants: PermissionSet::empty(),
        };
        let reason = reason_of(check(&no_create, &action));
        assert!(reason.contains("ADMIN_CREATE"));
    }

    #[test]
    fn test_permissions_can_only_be_delegated_by_holders() {
        let target = Uuid::new_v4();

        let writer = admin_with(PermissionSet::of([Permission::AdminWritePermissions]));
        let grant_unheld = SecurityAction::AdminPermissionGrant {
            target,
            permission: Permission::AdminBan,
        };
        let reason = reason_of(check(&writer, &grant_unheld));
        assert!(reason.contains("ADMIN_BAN"));

        let revoke_unheld = SecurityAction::AdminPermissionRevoke {
            target,
            permission: Permission::AdminBan,
        };
        assert!(!check(&writer, &revoke_unheld).is_allowed());

        let holder = admin_with(PermissionSet::of([
            Permission::AdminWritePermissions,
            Permission::AdminBan,
        ]));
        assert!(check(&holder, &grant_unheld).is_allowed());
        assert!(check(&holder, &revoke_unheld).is_allowed());
    }

    #[test]
    fn test_permission_writes_follow_self_discipline() {
        let holder = admin_with(PermissionSet::of([
            Permission::AdminWritePermissionsSelf,
            Permission::AuditRead,
        ]));

        let on_self = SecurityAction::AdminPermissionRevoke {
            target: holder.id,
            permission: Permission::AuditRead,
        };
        assert!(check(&holder, &on_self).is_allowed());

        let on_other = SecurityAction::AdminPermissionRevoke {
            target: Uuid::new_v4(),
            permission: Permission::AuditRead,
        };
        assert!(!check(&holder, &on_other).is_allowed());
    }
}
