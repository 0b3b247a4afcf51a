//! Search queries against Postgres.
//!
//! Every search runs as a COUNT followed by a page SELECT, both inside the
//! command's transaction. The count fixes the page plan, so the offset always
//! lands inside the result set even when the client's page index has gone
//! stale.

use super::{PgStore, decode_error};
use crate::db::errors::Result;
use crate::db::queries::SearchQueries;
use crate::model::{AdminSummary, AuditEvent, Idname, UserSummary};
use crate::search::{
    AdminColumn, AdminSearchByEmailParameters, AdminSearchParameters, AuditSearchParameters, Page, PagePlan,
    SearchLimit, TimeRange, UserColumn, UserSearchByEmailParameters, UserSearchParameters,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

/// Escapes LIKE metacharacters and wraps the query for substring matching.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%{escaped}%")
}

fn push_time_range(builder: &mut QueryBuilder<'_, Postgres>, column: &str, range: &TimeRange) {
    builder.push(column);
    builder.push(" BETWEEN ");
    builder.push_bind(range.time_low);
    builder.push(" AND ");
    builder.push_bind(range.time_high);
}

fn push_substring_match(builder: &mut QueryBuilder<'_, Postgres>, column_sql: &str, query: &str) {
    builder.push(" AND ");
    builder.push(column_sql);
    builder.push(" ILIKE ");
    builder.push_bind(like_pattern(query));
    builder.push(" ESCAPE '\\'");
}

/// Appends `ORDER BY` with a stable `id` tiebreak so pagination never
/// reshuffles rows that compare equal on the sort column.
fn push_ordering(builder: &mut QueryBuilder<'_, Postgres>, column_sql: &str, ascending: bool) {
    builder.push(" ORDER BY ");
    builder.push(column_sql);
    builder.push(if ascending { " ASC" } else { " DESC" });
    if column_sql != "id" {
        builder.push(", id ASC");
    }
}

fn push_page_window(builder: &mut QueryBuilder<'_, Postgres>, limit: SearchLimit, plan: &PagePlan) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(limit.get()));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(plan.offset).unwrap_or(i64::MAX));
}

fn admin_column_sql(column: AdminColumn) -> &'static str {
    match column {
        AdminColumn::ById => "id",
        AdminColumn::ByIdname => "idname",
        AdminColumn::ByRealName => "real_name",
        AdminColumn::ByTimeCreated => "time_created",
        AdminColumn::ByTimeUpdated => "time_updated",
    }
}

fn user_column_sql(column: UserColumn) -> &'static str {
    match column {
        UserColumn::ById => "id",
        UserColumn::ByIdname => "idname",
        UserColumn::ByRealName => "real_name",
        UserColumn::ByTimeCreated => "time_created",
        UserColumn::ByTimeUpdated => "time_updated",
    }
}

fn push_name_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    created: &TimeRange,
    updated: &TimeRange,
    query: Option<&str>,
) {
    push_time_range(builder, "time_created", created);
    builder.push(" AND ");
    push_time_range(builder, "time_updated", updated);
    if let Some(query) = query {
        let pattern = like_pattern(query);
        builder.push(" AND (idname ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR real_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

fn push_email_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    created: &TimeRange,
    updated: &TimeRange,
    search: &str,
) {
    push_time_range(builder, "time_created", created);
    builder.push(" AND ");
    push_time_range(builder, "time_updated", updated);
    push_substring_match(builder, "email", search);
}

fn push_audit_filters(builder: &mut QueryBuilder<'_, Postgres>, parameters: &AuditSearchParameters) {
    push_time_range(builder, "time", &parameters.time_range);
    if let Some(owner) = &parameters.owner {
        push_substring_match(builder, "CAST(owner AS TEXT)", owner);
    }
    if let Some(event_type) = &parameters.event_type {
        push_substring_match(builder, "event_type", event_type);
    }
    if let Some(message) = &parameters.message {
        push_substring_match(builder, "message", message);
    }
}

// Summary projection shared by admin and user searches
#[derive(Debug, FromRow)]
struct SummaryRow {
    pub id: Uuid,
    pub idname: String,
    pub real_name: String,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
}

impl SummaryRow {
    fn into_admin_summary(self) -> Result<AdminSummary> {
        Ok(AdminSummary {
            id: self.id,
            idname: self.idname.parse::<Idname>().map_err(decode_error)?,
            real_name: self.real_name,
            time_created: self.time_created,
            time_updated: self.time_updated,
        })
    }

    fn into_user_summary(self) -> Result<UserSummary> {
        Ok(UserSummary {
            id: self.id,
            idname: self.idname.parse::<Idname>().map_err(decode_error)?,
            real_name: self.real_name,
            time_created: self.time_created,
            time_updated: self.time_updated,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub owner: Uuid,
    pub event_type: String,
    pub message: String,
}

impl AuditRow {
    fn into_event(self) -> AuditEvent {
        AuditEvent {
            id: self.id,
            time: self.time,
            owner: self.owner,
            event_type: self.event_type,
            message: self.message,
        }
    }
}

impl PgStore {
    async fn run_count(&mut self, builder: &mut QueryBuilder<'_, Postgres>) -> Result<u64> {
        let total: i64 = builder.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

#[async_trait]
impl SearchQueries<AdminSearchParameters> for PgStore {
    type Item = AdminSummary;

    #[instrument(skip(self, parameters), err)]
    async fn search_page(&mut self, parameters: &AdminSearchParameters, page_index: u32) -> Result<Page<AdminSummary>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM admins WHERE ");
        push_name_filters(
            &mut count,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            parameters.query.as_deref(),
        );
        let total = self.run_count(&mut count).await?;
        let plan = PagePlan::locate(total, parameters.limit, page_index);

        let mut select =
            QueryBuilder::new("SELECT id, idname, real_name, time_created, time_updated FROM admins WHERE ");
        push_name_filters(
            &mut select,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            parameters.query.as_deref(),
        );
        push_ordering(&mut select, admin_column_sql(parameters.ordering.column), parameters.ordering.ascending);
        push_page_window(&mut select, parameters.limit, &plan);

        let rows: Vec<SummaryRow> = select.build_query_as().fetch_all(self.conn()).await?;
        let items = rows
            .into_iter()
            .map(SummaryRow::into_admin_summary)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_plan(items, plan))
    }
}

#[async_trait]
impl SearchQueries<AdminSearchByEmailParameters> for PgStore {
    type Item = AdminSummary;

    #[instrument(skip(self, parameters), err)]
    async fn search_page(
        &mut self,
        parameters: &AdminSearchByEmailParameters,
        page_index: u32,
    ) -> Result<Page<AdminSummary>> {
        // An admin with several matching addresses appears once.
        let mut count =
            QueryBuilder::new("SELECT COUNT(DISTINCT id) FROM admins JOIN admin_emails ON admin_id = id WHERE ");
        push_email_filters(
            &mut count,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            &parameters.search,
        );
        let total = self.run_count(&mut count).await?;
        let plan = PagePlan::locate(total, parameters.limit, page_index);

        let mut select = QueryBuilder::new(
            "SELECT DISTINCT id, idname, real_name, time_created, time_updated \
             FROM admins JOIN admin_emails ON admin_id = id WHERE ",
        );
        push_email_filters(
            &mut select,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            &parameters.search,
        );
        push_ordering(&mut select, admin_column_sql(parameters.ordering.column), parameters.ordering.ascending);
        push_page_window(&mut select, parameters.limit, &plan);

        let rows: Vec<SummaryRow> = select.build_query_as().fetch_all(self.conn()).await?;
        let items = rows
            .into_iter()
            .map(SummaryRow::into_admin_summary)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_plan(items, plan))
    }
}

#[async_trait]
impl SearchQueries<UserSearchParameters> for PgStore {
    type Item = UserSummary;

    #[instrument(skip(self, parameters), err)]
    async fn search_page(&mut self, parameters: &UserSearchParameters, page_index: u32) -> Result<Page<UserSummary>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE ");
        push_name_filters(
            &mut count,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            parameters.query.as_deref(),
        );
        let total = self.run_count(&mut count).await?;
        let plan = PagePlan::locate(total, parameters.limit, page_index);

        let mut select =
            QueryBuilder::new("SELECT id, idname, real_name, time_created, time_updated FROM users WHERE ");
        push_name_filters(
            &mut select,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            parameters.query.as_deref(),
        );
        push_ordering(&mut select, user_column_sql(parameters.ordering.column), parameters.ordering.ascending);
        push_page_window(&mut select, parameters.limit, &plan);

        let rows: Vec<SummaryRow> = select.build_query_as().fetch_all(self.conn()).await?;
        let items = rows
            .into_iter()
            .map(SummaryRow::into_user_summary)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_plan(items, plan))
    }
}

#[async_trait]
impl SearchQueries<UserSearchByEmailParameters> for PgStore {
    type Item = UserSummary;

    #[instrument(skip(self, parameters), err)]
    async fn search_page(
        &mut self,
        parameters: &UserSearchByEmailParameters,
        page_index: u32,
    ) -> Result<Page<UserSummary>> {
        let mut count =
            QueryBuilder::new("SELECT COUNT(DISTINCT id) FROM users JOIN user_emails ON user_id = id WHERE ");
        push_email_filters(
            &mut count,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            &parameters.search,
        );
        let total = self.run_count(&mut count).await?;
        let plan = PagePlan::locate(total, parameters.limit, page_index);

        let mut select = QueryBuilder::new(
            "SELECT DISTINCT id, idname, real_name, time_created, time_updated \
             FROM users JOIN user_emails ON user_id = id WHERE ",
        );
        push_email_filters(
            &mut select,
            &parameters.time_created_range,
            &parameters.time_updated_range,
            &parameters.search,
        );
        push_ordering(&mut select, user_column_sql(parameters.ordering.column), parameters.ordering.ascending);
        push_page_window(&mut select, parameters.limit, &plan);

        let rows: Vec<SummaryRow> = select.build_query_as().fetch_all(self.conn()).await?;
        let items = rows
            .into_iter()
            .map(SummaryRow::into_user_summary)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_plan(items, plan))
    }
}

#[async_trait]
impl SearchQueries<AuditSearchParameters> for PgStore {
    type Item = AuditEvent;

    #[instrument(skip(self, parameters), err)]
    async fn search_page(&mut self, parameters: &AuditSearchParameters, page_index: u32) -> Result<Page<AuditEvent>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM audit WHERE ");
        push_audit_filters(&mut count, parameters);
        let total = self.run_count(&mut count).await?;
        let plan = PagePlan::locate(total, parameters.limit, page_index);

        let mut select = QueryBuilder::new("SELECT id, time, owner, event_type, message FROM audit WHERE ");
        push_audit_filters(&mut select, parameters);
        // The audit log always reads in log order.
        select.push(" ORDER BY id ASC");
        push_page_window(&mut select, parameters.limit, &plan);

        let rows: Vec<AuditRow> = select.build_query_as().fetch_all(self.conn()).await?;
        let items = rows.into_iter().map(AuditRow::into_event).collect();
        Ok(Page::from_plan(items, plan))
    }
}
