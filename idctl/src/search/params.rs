//! Search parameter types.
//!
//! Parameters are fixed when a search begins and ride on the cursor for its
//! whole lifetime. All limits pass through [`SearchLimit`], so a page can
//! never be larger than [`SearchLimit::MAX`] no matter what the client asked
//! for.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size cap applied to every search.
///
/// Construction clamps into `1..=MAX`; there is no way to obtain an
/// out-of-range limit, including via deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct SearchLimit(u32);

impl SearchLimit {
    pub const MAX: u32 = 1000;

    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for SearchLimit {
    fn from(requested: u32) -> Self {
        Self(requested.clamp(1, Self::MAX))
    }
}

impl From<SearchLimit> for u32 {
    fn from(limit: SearchLimit) -> Self {
        limit.0
    }
}

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub time_low: DateTime<Utc>,
    pub time_high: DateTime<Utc>,
}

impl TimeRange {
    /// The widest representable range; the default for searches that do not
    /// constrain time.
    pub fn largest() -> Self {
        Self {
            time_low: DateTime::UNIX_EPOCH,
            time_high: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.time_low <= time && time <= self.time_high
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::largest()
    }
}

/// Sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOrdering<C> {
    pub column: C,
    pub ascending: bool,
}

/// Sortable columns for admin searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminColumn {
    ById,
    ByIdname,
    ByRealName,
    ByTimeCreated,
    ByTimeUpdated,
}

/// Sortable columns for user searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserColumn {
    ById,
    ByIdname,
    ByRealName,
    ByTimeCreated,
    ByTimeUpdated,
}

fn default_admin_ordering() -> ColumnOrdering<AdminColumn> {
    ColumnOrdering {
        column: AdminColumn::ByIdname,
        ascending: true,
    }
}

fn default_user_ordering() -> ColumnOrdering<UserColumn> {
    ColumnOrdering {
        column: UserColumn::ByIdname,
        ascending: true,
    }
}

/// Parameters for searching admins by name.
///
/// `query`, when present, matches case-insensitively as a substring of the
/// login name or the real name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct AdminSearchParameters {
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_created_range: TimeRange,
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_updated_range: TimeRange,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_admin_ordering")]
    #[builder(default = default_admin_ordering())]
    pub ordering: ColumnOrdering<AdminColumn>,
    pub limit: SearchLimit,
}

/// Parameters for searching admins by email address (substring,
/// case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct AdminSearchByEmailParameters {
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_created_range: TimeRange,
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_updated_range: TimeRange,
    pub search: String,
    #[serde(default = "default_admin_ordering")]
    #[builder(default = default_admin_ordering())]
    pub ordering: ColumnOrdering<AdminColumn>,
    pub limit: SearchLimit,
}

/// Parameters for searching users by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct UserSearchParameters {
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_created_range: TimeRange,
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_updated_range: TimeRange,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_user_ordering")]
    #[builder(default = default_user_ordering())]
    pub ordering: ColumnOrdering<UserColumn>,
    pub limit: SearchLimit,
}

/// Parameters for searching users by email address (substring,
/// case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct UserSearchByEmailParameters {
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_created_range: TimeRange,
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_updated_range: TimeRange,
    pub search: String,
    #[serde(default = "default_user_ordering")]
    #[builder(default = default_user_ordering())]
    pub ordering: ColumnOrdering<UserColumn>,
    pub limit: SearchLimit,
}

/// Parameters for searching the audit log.
///
/// The optional `owner`, `event_type` and `message` filters match
/// case-insensitively as substrings. Results are always in log order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct AuditSearchParameters {
    #[serde(default = "TimeRange::largest")]
    #[builder(default = TimeRange::largest())]
    pub time_range: TimeRange,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub limit: SearchLimit,
}
