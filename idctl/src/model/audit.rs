//! Audit log entries.

use crate::types::AuditEventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An entry in the append-only audit log.
///
/// `owner` is the account responsible for the event: the acting admin for
/// commands, or the account itself for logins. `event_type` is an upper-case
/// tag such as `ADMIN_CREATED`; `message` carries the event's subject, with
/// `|` separating fields where there is more than one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub time: DateTime<Utc>,
    pub owner: Uuid,
    pub event_type: String,
    pub message: String,
}

/// A new audit entry, before the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEventCreate {
    pub time: DateTime<Utc>,
    pub owner: Uuid,
    pub event_type: String,
    pub message: String,
}
