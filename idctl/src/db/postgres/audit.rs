//! Audit log writes against Postgres.

use super::PgStore;
use crate::db::errors::Result;
use crate::db::queries::AuditQueries;
use crate::model::AuditEventCreate;
use crate::types::abbrev_uuid;
use async_trait::async_trait;
use tracing::instrument;

#[async_trait]
impl AuditQueries for PgStore {
    #[instrument(skip(self, event), fields(owner = %abbrev_uuid(&event.owner), event_type = %event.event_type), err)]
    async fn audit_put(&mut self, event: &AuditEventCreate) -> Result<()> {
        sqlx::query("INSERT INTO audit (time, owner, event_type, message) VALUES ($1, $2, $3, $4)")
            .bind(event.time)
            .bind(event.owner)
            .bind(&event.event_type)
            .bind(&event.message)
            .execute(self.conn())
            .await?;

        Ok(())
    }
}
