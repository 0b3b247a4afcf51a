//! # idctl: Identity Store Back End
//!
//! `idctl` is the server-side core of an identity store: account records for
//! administrators and users, capability-based authorization, login with
//! per-name rate limiting, bans, an append-only audit log, and stateful
//! server-side searches. It is a library crate; a transport (HTTP, message
//! queue, test harness) feeds it commands and relays the responses.
//!
//! ## Overview
//!
//! The store distinguishes two account kinds. **Admins** operate the system:
//! each holds a set of [permissions](model::Permission) and every protected
//! operation names the permission it requires. **Users** are the accounts the
//! system exists to manage; they can log in but hold no permissions and issue
//! no commands. Both kinds carry a validated login name
//! ([`Idname`](model::Idname)), a real name, one or more email addresses, and
//! an Argon2id password record.
//!
//! ### What It Does
//!
//! A client submits a [`Command`](command::Command), a JSON-tagged enum
//! covering login, account CRUD, email management, permission grants, bans,
//! and searches. The executor authenticates the session token, runs the
//! security policy, applies the change inside a single database transaction,
//! records an audit event for every write, and returns a
//! [`Response`](command::Response). A failed command never leaves partial
//! state behind: the transaction commits only when the handler produced a
//! non-error response.
//!
//! ## Architecture
//!
//! Persistence is PostgreSQL via `sqlx`; migrations run automatically through
//! [`initialize`]. Sessions and login rate limiting live in memory (`moka`
//! and `dashmap`), so a session does not survive a process restart.
//!
//! ### Command Flow
//!
//! Every command passes through the same pipeline. The caller opens a store
//! transaction ([`PgStore`](db::postgres::PgStore), or the in-memory store
//! from [`test_utils`] in tests) and hands it to
//! [`execute_transactional`](command::execute_transactional) together with
//! the [`Services`] handle, a request id, and the authenticated identity
//! resolved from the client's session token. The executor dispatches to a
//! handler, which checks the [security policy](security) first, then reads
//! and writes through the store traits in [`db`], and records audit events
//! for every mutation. Searches are stateful: each session owns a
//! [`SearchSession`](search::SearchSession) whose cursor pages through
//! results across successive `*_SEARCH_NEXT` / `*_SEARCH_PREVIOUS` commands.
//!
//! ### Core Components
//!
//! The **command layer** ([`command`]) defines the wire protocol enums, the
//! per-request [`CommandContext`](command::CommandContext), and the executor
//! that owns commit and rollback. The **security policy** ([`security`])
//! decides every protected operation from the acting admin's permission set,
//! including the rule that admins may only grant permissions they themselves
//! hold. The **authentication layer** ([`auth`]) covers Argon2id password
//! records, the session cache, the per-name login rate limiter, and the
//! login flows shared by admins and users. The **storage layer** ([`db`])
//! abstracts the store behind traits so that handlers and tests never name
//! Postgres directly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use idctl::command::{execute_transactional, Command};
//! use idctl::db::postgres::PgStore;
//! use idctl::{Config, Services};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     idctl::telemetry::init_telemetry()?;
//!
//!     // Connect, run migrations, create the initial admin if the store is empty
//!     let pool = idctl::db::postgres::connect(&config.database.url, &config.pool_options()).await?;
//!     idctl::initialize(&config, &pool).await?;
//!
//!     let services = Services::from_config(&config);
//!
//!     // Each command runs in its own transaction
//!     let store = PgStore::begin(&pool).await?;
//!     let response = execute_transactional(
//!         store,
//!         &services,
//!         Uuid::new_v4(),
//!         None,
//!         Command::Login {
//!             username: "root".to_string(),
//!             password: "hunter2".to_string(),
//!         },
//!     )
//!     .await;
//!
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The crate requires a PostgreSQL database and runs migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! // Run migrations
//! idctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod auth;
pub mod clock;
pub mod command;
pub mod config;
pub mod db;
pub mod errors;
pub mod model;
pub mod search;
pub mod security;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::auth::password::PasswordRecord;
use crate::auth::rate_limit::LoginRateLimiter;
use crate::auth::session::SessionService;
use crate::clock::{Clock, SystemClock};
use crate::config::InitialAdminConfig;
use crate::db::StoreTransaction;
use crate::model::{Admin, AuditEventCreate, PermissionSet};
use crate::types::abbrev_uuid;
use bon::Builder;
use chrono::{DateTime, Utc};
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use types::{AdminId, AuditEventId, RequestId, UserId};

/// Shared service handles passed to every command execution.
///
/// Unlike the store, which is opened per command, these live for the life of
/// the process.
///
/// # Fields
///
/// - `clock`: Time source; swap in a fixed clock in tests
/// - `sessions`: In-memory session cache for logged-in accounts
/// - `login_limiter`: Per-name rate limiter applied before credential checks
///
/// # Example
///
/// ```ignore
/// let services = Services::builder()
///     .clock(Arc::new(SystemClock))
///     .sessions(SessionService::new(100_000, Duration::from_secs(1800)))
///     .login_limiter(Arc::new(LoginRateLimiter::new(Duration::from_secs(5))))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionService,
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl Services {
    /// Build the production service set from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .clock(Arc::new(SystemClock))
            .sessions(SessionService::new(
                config.sessions.capacity,
                config.sessions.idle_timeout,
            ))
            .login_limiter(Arc::new(LoginRateLimiter::new(config.limits.login_delay)))
            .build()
    }
}

/// Get the idctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Run migrations and bootstrap the initial admin.
///
/// Called once at startup, after [`connect`](db::postgres::connect) and
/// before the first command is accepted.
#[instrument(skip_all)]
pub async fn initialize(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    let store = db::postgres::PgStore::begin(pool).await?;
    bootstrap_initial_admin(store, config.initial_admin.as_ref(), Utc::now()).await?;

    Ok(())
}

/// Create the initial admin if the store holds no admins at all.
///
/// The account gets every permission, so it can create further admins with
/// narrower sets. A store that already has at least one admin is left
/// untouched, which makes restarting with the same configuration safe.
///
/// Returns the id of the created admin, or `None` when nothing was done.
#[instrument(skip_all)]
pub async fn bootstrap_initial_admin<T>(
    mut store: T,
    initial_admin: Option<&InitialAdminConfig>,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<AdminId>>
where
    T: StoreTransaction,
{
    if store.admin_count().await? > 0 {
        store.rollback().await?;
        return Ok(None);
    }

    let Some(initial) = initial_admin else {
        warn!("the store has no admins and initial_admin is not configured; nobody can log in");
        store.rollback().await?;
        return Ok(None);
    };

    let password = initial.password.clone();
    let record = tokio::task::spawn_blocking(move || PasswordRecord::new(&password)).await??;

    let admin = Admin {
        id: Uuid::new_v4(),
        idname: initial.idname.clone(),
        real_name: initial.real_name.clone(),
        emails: vec![initial.email.clone()],
        time_created: now,
        time_updated: now,
        password: record,
        permissions: PermissionSet::all(),
    };

    store.admin_create(&admin).await?;
    store
        .audit_put(&AuditEventCreate {
            time: now,
            owner: admin.id,
            event_type: "ADMIN_CREATED".to_string(),
            message: admin.id.to_string(),
        })
        .await?;
    store.commit().await?;

    info!(admin_id = %abbrev_uuid(&admin.id), idname = %admin.idname, "created initial admin");
    Ok(Some(admin.id))
}
