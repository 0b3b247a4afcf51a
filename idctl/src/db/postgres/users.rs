//! User queries against Postgres. Mirrors the admin side minus permissions.

use super::{PgStore, decode_error};
use crate::auth::PasswordRecord;
use crate::db::errors::{DbError, Result};
use crate::db::queries::UsersQueries;
use crate::model::{Ban, EmailAddress, Idname, User, UserUpdate};
use crate::types::{UserId, abbrev_uuid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

const SELECT_USER: &str =
    "SELECT id, idname, real_name, time_created, time_updated, password_hash, password_expires FROM users";

// Database entity model
#[derive(Debug, FromRow)]
struct UserRow {
    pub id: Uuid,
    pub idname: String,
    pub real_name: String,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    pub password_hash: String,
    pub password_expires: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_user(self, emails: Vec<EmailAddress>) -> Result<User> {
        Ok(User {
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
        })
    }
}

impl PgStore {
    async fn user_emails_of(&mut self, id: UserId) -> Result<Vec<EmailAddress>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM user_emails WHERE user_id = $1 ORDER BY email")
                .bind(id)
                .fetch_all(self.conn())
                .await?;

        emails
            .into_iter()
            .map(|email| email.parse::<EmailAddress>().map_err(decode_error))
            .collect()
    }

    async fn user_assemble(&mut self, row: Option<UserRow>) -> Result<Option<User>> {
        match row {
            Some(row) => {
                let emails = self.user_emails_of(row.id).await?;
                Ok(Some(row.into_user(emails)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UsersQueries for PgStore {
    #[instrument(skip(self, user), fields(user_id = %abbrev_uuid(&user.id), idname = %user.idname), err)]
    async fn user_create(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, idname, real_name, time_created, time_updated, password_hash, password_expires) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(user.idname.as_str())
        .bind(&user.real_name)
        .bind(user.time_created)
        .bind(user.time_updated)
        .bind(&user.password.hash)
        .bind(user.password.expires)
        .execute(self.conn())
        .await?;

        for email in &user.emails {
            sqlx::query("INSERT INTO user_emails (user_id, email) VALUES ($1, $2)")
                .bind(user.id)
                .bind(email.as_str())
                .execute(self.conn())
                .await?;
        }

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_get(&mut self, id: UserId) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql).bind(id).fetch_optional(self.conn()).await?;

        self.user_assemble(row).await
    }

    #[instrument(skip(self, idname), fields(idname = %idname), err)]
    async fn user_get_by_idname(&mut self, idname: &Idname) -> Result<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE LOWER(idname) = LOWER($1)");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(idname.as_str())
            .fetch_optional(self.conn())
            .await?;

        self.user_assemble(row).await
    }

    #[instrument(skip(self, email), err)]
    async fn user_get_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT u.id, u.idname, u.real_name, u.time_created, u.time_updated, \
                    u.password_hash, u.password_expires \
             FROM users u JOIN user_emails e ON e.user_id = u.id WHERE e.email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.conn())
        .await?;

        self.user_assemble(row).await
    }

    #[instrument(skip(self, update), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_update(&mut self, id: UserId, update: &UserUpdate) -> Result<User> {
        let mut builder = QueryBuilder::new("UPDATE users SET time_updated = ");
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
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(self.conn()).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::UserNonexistent { id });
        }

        self.user_get_require(id).await
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_delete(&mut self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNonexistent { id });
        }
        Ok(())
    }

    #[instrument(skip(self, email), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_email_add(&mut self, id: UserId, email: &EmailAddress) -> Result<()> {
        sqlx::query("INSERT INTO user_emails (user_id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(email.as_str())
            .execute(self.conn())
            .await?;

        Ok(())
    }

    #[instrument(skip(self, email), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_email_remove(&mut self, id: UserId, email: &EmailAddress) -> Result<()> {
        sqlx::query("DELETE FROM user_emails WHERE user_id = $1 AND email = $2")
            .bind(id)
            .bind(email.as_str())
            .execute(self.conn())
            .await?;

        Ok(())
    }

    #[instrument(skip(self, ban), fields(user_id = %abbrev_uuid(&ban.target)), err)]
    async fn user_ban_create(&mut self, ban: &Ban) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_bans (user_id, reason, expires) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET reason = EXCLUDED.reason, expires = EXCLUDED.expires",
        )
        .bind(ban.target)
        .bind(&ban.reason)
        .bind(ban.expires)
        .execute(self.conn())
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn user_ban_get(&mut self, id: UserId) -> Result<Option<Ban>> {
        let row: Option<(String, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT reason, expires FROM user_bans WHERE user_id = $1")
                .bind(id)
                .fetch_optional(self.conn())
                .await?;

        Ok(row.map(|(reason, expires)| Ban { target: id, reason, expires }))
    }

    #[instrument(skip(self, ban), fields(user_id = %abbrev_uuid(&ban.target)), err)]
    async fn user_ban_delete(&mut self, ban: &Ban) -> Result<()> {
        sqlx::query("DELETE FROM user_bans WHERE user_id = $1")
            .bind(ban.target)
            .execute(self.conn())
            .await?;

        Ok(())
    }
}
