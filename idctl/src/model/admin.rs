//! Administrator accounts.

use crate::auth::password::PasswordRecord;
use crate::model::{EmailAddress, Idname, PermissionSet};
use crate::types::AdminId;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An administrator account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub idname: Idname,
    pub real_name: String,
    pub emails: Vec<EmailAddress>,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    pub password: PasswordRecord,
    pub permissions: PermissionSet,
}

/// The projection of an [`Admin`] returned by searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSummary {
    pub id: AdminId,
    pub idname: Idname,
    pub real_name: String,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
}

impl AdminSummary {
    pub fn of(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            idname: admin.idname.clone(),
            real_name: admin.real_name.clone(),
            time_created: admin.time_created,
            time_updated: admin.time_updated,
        }
    }
}

/// A partial update applied to an administrator.
///
/// `None` fields are left untouched. `time_updated` is always written and is
/// supplied by the caller so that all timestamps in a command come from the
/// same clock reading.
#[derive(Debug, Clone, Builder)]
pub struct AdminUpdate {
    pub idname: Option<Idname>,
    pub real_name: Option<String>,
    pub password: Option<PasswordRecord>,
    pub permissions: Option<PermissionSet>,
    pub time_updated: DateTime<Utc>,
}
