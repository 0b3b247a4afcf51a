//! Postgres implementation of the store traits.
//!
//! A [`PgStore`] wraps one Postgres transaction. Nothing it writes is visible
//! until [`commit`](crate::db::StoreTransaction::commit) runs; the command
//! executor decides whether that happens. Queries use the runtime sqlx API
//! throughout, so building the crate needs no live database.

mod admins;
mod audit;
mod search;
mod users;

use crate::db::errors::{DbError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::instrument;

/// One identity-store transaction against Postgres.
pub struct PgStore {
    tx: Transaction<'static, Postgres>,
}

impl PgStore {
    /// Opens a transaction on the pool.
    #[instrument(skip(pool), err)]
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        Ok(Self { tx: pool.begin().await? })
    }

    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl crate::db::queries::StoreTransaction for PgStore {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Connection pool settings sourced from [`crate::config::PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Connects a pool with the given options.
#[instrument(skip(url), err)]
pub async fn connect(url: &str, options: &PoolOptions) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect(url)
        .await?;

    Ok(pool)
}

/// Wraps a decode failure as a non-recoverable store error. Rows fail to
/// decode only when the database holds values that the domain types reject,
/// which means the schema and the code disagree.
fn decode_error(error: impl std::error::Error + Send + Sync + 'static) -> DbError {
    DbError::Other(anyhow::Error::new(error))
}
