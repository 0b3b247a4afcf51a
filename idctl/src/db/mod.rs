//! Storage layer.

pub mod errors;
pub mod postgres;
pub mod queries;

pub use errors::{DbError, Result};
pub use queries::{
    AdminsQueries, AuditQueries, IdentityStore, SearchQueries, StoreTransaction, UsersQueries,
};
