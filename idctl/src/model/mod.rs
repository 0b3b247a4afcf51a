//! Domain model types.
//!
//! This module defines the value types the rest of the crate operates on:
//!
//! - [`Admin`] / [`User`]: the two account kinds, with validated names and emails
//! - [`Permission`] / [`PermissionSet`]: the capability tokens admins hold
//! - [`Ban`]: a ban placed on an account, optionally expiring
//! - [`AuditEvent`]: an entry in the append-only audit log
//!
//! Validated newtypes ([`Idname`], [`EmailAddress`]) reject malformed input at
//! construction, so code further in never sees an invalid name or address.

pub mod admin;
pub mod audit;
pub mod ban;
pub mod email;
pub mod idname;
pub mod permissions;
pub mod user;

pub use crate::auth::password::PasswordRecord;
pub use admin::{Admin, AdminSummary, AdminUpdate};
pub use audit::{AuditEvent, AuditEventCreate};
pub use ban::Ban;
pub use email::EmailAddress;
pub use idname::Idname;
pub use permissions::{Permission, PermissionSet};
pub use user::{User, UserSummary, UserUpdate};

use thiserror::Error;

/// Rejection produced when parsing a validated newtype from raw input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid login name: {0}")]
    InvalidIdname(String),
}
