//! Admin queries against Postgres.

use super::{PgStore, decode_error};
use crate::auth::PasswordRecord;
use crate::db::errors::{DbError, Result};
use crate::db::queries::AdminsQueries;
use crate::model::{Admin, AdminUpdate, Ban, EmailAddress, Idname, Permission, PermissionSet};
use crate::types::{AdminId, abbrev_uuid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

const SELECT_ADMIN: &str =
    "SELECT id, idname, real_name, time_created, time_updated, password_hash, password_expires, permissions FROM admins";

// Database entity model
#[derive(Debug, FromRow)]
struct AdminRow {
    pub id: Uuid,
    pub idname: String,
    pub real_name: String,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    pub password_hash: String,
    pub password_expires: Option<DateTime<Utc>>,
    pub permissions: Vec<String>,
}

impl AdminRow {
    fn into_admin(self, emails: Vec<EmailAddress>) -> Result<Admin> {
        Ok(Admin {
            id: self.id,
            idname: self.idname.parse::<Idname>().map_err(decode_error)?,
            real_name: self.real_name,
            emails,
            time_created: self.time_created,
            time_updated: self.time_updated,
            password: PasswordRecord {
                hash: self.password_hash,
                expires: self.password_expires,
            },
            permissions: permissions_from_names(&self.permissions)?,
        })
    }
}

pub(super) fn permission_names(set: &PermissionSet) -> Vec<String> {
    set.iter().map(|p| p.as_str().to_string()).collect()
}

pub(super) fn permissions_from_names(names: &[String]) -> Result<PermissionSet> {
    names
        .iter()
        .map(|name| name.parse::<Permission>().map_err(decode_error))
        .collect()
}

impl PgStore {
    async fn admin_emails_of(&mut self, id: AdminId) -> Result<Vec<EmailAddress>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM admin_emails WHERE admin_id = $1 ORDER BY email")
                .bind(id)
                .fetch_all(self.conn())
                .await?;

        emails
            .into_iter()
            .map(|email| email.parse::<EmailAddress>().map_err(decode_error))
            .collect()
    }

    async fn admin_assemble(&mut self, row: Option<AdminRow>) -> Result<Option<Admin>> {
        match row {
            Some(row) => {
                let emails = self.admin_emails_of(row.id).await?;
                Ok(Some(row.into_admin(emails)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AdminsQueries for PgStore {
    #[instrument(skip(self, admin), fields(admin_id = %abbrev_uuid(&admin.id), idname = %admin.idname), err)]
    async fn admin_create(&mut self, admin: &Admin) -> Result<()> {
        sqlx::query(
            "INSERT INTO admins (id, idname, real_name, time_created, time_updated, password_hash, password_expires, permissions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(admin.id)
        .bind(admin.idname.as_str())
        .bind(&admin.real_name)
        .bind(admin.time_created)
        .bind(admin.time_updated)
        .bind(&admin.password.hash)
        .bind(admin.password.expires)
        .bind(permission_names(&admin.permissions))
        .execute(self.conn())
        .await?;

        for email in &admin.emails {
            sqlx::query("INSERT INTO admin_emails (admin_id, email) VALUES ($1, $2)")
                .bind(admin.id)
                .bind(email.as_str())
                .execute(self.conn())
                .await?;
        }

        Ok(())
    }

    #[instrument(skip(self), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_get(&mut self, id: AdminId) -> Result<Option<Admin>> {
        let sql = format!("{SELECT_ADMIN} WHERE id = $1");
        let row: Option<AdminRow> = sqlx::query_as(&sql).bind(id).fetch_optional(self.conn()).await?;

        self.admin_assemble(row).await
    }

    #[instrument(skip(self, idname), fields(idname = %idname), err)]
    async fn admin_get_by_idname(&mut self, idname: &Idname) -> Result<Option<Admin>> {
        let sql = format!("{SELECT_ADMIN} WHERE LOWER(idname) = LOWER($1)");
        let row: Option<AdminRow> = sqlx::query_as(&sql)
            .bind(idname.as_str())
            .fetch_optional(self.conn())
            .await?;

        self.admin_assemble(row).await
    }

    #[instrument(skip(self, email), err)]
    async fn admin_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<Admin>> {
        // Stored addresses are lowercased by EmailAddress, so plain equality
        // is already case-insensitive.
        let row: Option<AdminRow> = sqlx::query_as(
            "SELECT a.id, a.idname, a.real_name, a.time_created, a.time_updated, \
                    a.password_hash, a.password_expires, a.permissions \
             FROM admins a JOIN admin_emails e ON e.admin_id = a.id WHERE e.email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.conn())
        .await?;

        self.admin_assemble(row).await
    }

    #[instrument(skip(self, update), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_update(&mut self, id: AdminId, update: &AdminUpdate) -> Result<Admin> {
        let mut builder = QueryBuilder::new("UPDATE admins SET time_updated = ");
        builder.push_bind(update.time_updated);
        if let Some(idname) = &update.idname {
            builder.push(", idname = ");
            builder.push_bind(idname.as_str());
        }
        if let Some(real_name) = &update.real_name {
            builder.push(", real_name = ");
            builder.push_bind(real_name);
        }
        if let Some(password) = &update.password {
            builder.push(", password_hash = ");
            builder.push_bind(&password.hash);
            builder.push(", password_expires = ");
            builder.push_bind(password.expires);
        }
        if let Some(permissions) = &update.permissions {
            builder.push(", permissions = ");
            builder.push_bind(permission_names(permissions));
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(self.conn()).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::AdminNonexistent { id });
        }

        self.admin_get_require(id).await
    }

    #[instrument(skip(self), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_delete(&mut self, id: AdminId) -> Result<()> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::AdminNonexistent { id });
        }
        Ok(())
    }

    #[instrument(skip(self, email), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_email_add(&mut self, id: AdminId, email: &EmailAddress) -> Result<()> {
        sqlx::query("INSERT INTO admin_emails (admin_id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(email.as_str())
            .execute(self.conn())
            .await?;

        Ok(())
    }

    #[instrument(skip(self, email), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_email_remove(&mut self, id: AdminId, email: &EmailAddress) -> Result<()> {
        sqlx::query("DELETE FROM admin_emails WHERE admin_id = $1 AND email = $2")
            .bind(id)
            .bind(email.as_str())
            .execute(self.conn())
            .await?;

        Ok(())
    }

    #[instrument(skip(self, ban), fields(admin_id = %abbrev_uuid(&ban.target)), err)]
    async fn admin_ban_create(&mut self, ban: &Ban) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_bans (admin_id, reason, expires) VALUES ($1, $2, $3) \
             ON CONFLICT (admin_id) DO UPDATE SET reason = EXCLUDED.reason, expires = EXCLUDED.expires",
        )
        .bind(ban.target)
        .bind(&ban.reason)
        .bind(ban.expires)
        .execute(self.conn())
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(admin_id = %abbrev_uuid(&id)), err)]
    async fn admin_ban_get(&mut self, id: AdminId) -> Result<Option<Ban>> {
        let row: Option<(String, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT reason, expires FROM admin_bans WHERE admin_id = $1")
                .bind(id)
                .fetch_optional(self.conn())
                .await?;

        Ok(row.map(|(reason, expires)| Ban { target: id, reason, expires }))
    }

    #[instrument(skip(self, ban), fields(admin_id = %abbrev_uuid(&ban.target)), err)]
    async fn admin_ban_delete(&mut self, ban: &Ban) -> Result<()> {
        sqlx::query("DELETE FROM admin_bans WHERE admin_id = $1")
            .bind(ban.target)
            .execute(self.conn())
            .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn admin_count(&mut self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
            .fetch_one(self.conn())
            .await?;

        Ok(u64::try_from(total).unwrap_or(0))
    }
}
