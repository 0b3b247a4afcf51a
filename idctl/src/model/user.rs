//! User accounts.

use crate::auth::password::PasswordRecord;
use crate::model::{EmailAddress, Idname};
use crate::types::UserId;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account. Users authenticate but hold no permissions; only admins
/// act through the command pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub idname: Idname,
    pub real_name: String,
    pub emails: Vec<EmailAddress>,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    pub password: PasswordRecord,
}

/// The projection of a [`User`] returned by searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub idname: Idname,
    pub real_name: String,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
}

impl UserSummary {
    pub fn of(user: &User) -> Self {
        Self {
            id: user.id,
            idname: user.idname.clone(),
            real_name: user.real_name.clone(),
            time_created: user.time_created,
            time_updated: user.time_updated,
        }
    }
}

/// A partial update applied to a user. `None` fields are left untouched.
#[derive(Debug, Clone, Builder)]
pub struct UserUpdate {
    pub idname: Option<Idname>,
    pub real_name: Option<String>,
    pub password: Option<PasswordRecord>,
    pub time_updated: DateTime<Utc>,
}
