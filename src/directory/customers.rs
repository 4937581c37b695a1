//! Customer account directory: lifecycle status, filtered listing, and
//! Postgres storage.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status, closed set. Accounts enter as `pending` from
/// self-registration; this service only moves them between states and never
/// deletes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
    Active,
    Inactive,
}

impl CustomerStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "suspended" => Some(Self::Suspended),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Customer account as consumed by the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: Option<String>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// One lifecycle transition: the target status plus who acted and why.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: CustomerStatus,
    pub acted_by: Uuid,
    pub reason: Option<String>,
}

impl StatusChange {
    #[must_use]
    pub fn approval(acted_by: Uuid, reason: Option<String>) -> Self {
        Self {
            status: CustomerStatus::Approved,
            acted_by,
            reason,
        }
    }

    #[must_use]
    pub fn rejection(acted_by: Uuid, reason: String) -> Self {
        Self {
            status: CustomerStatus::Rejected,
            acted_by,
            reason: Some(reason),
        }
    }

    #[must_use]
    pub fn suspension(acted_by: Uuid, reason: String) -> Self {
        Self {
            status: CustomerStatus::Suspended,
            acted_by,
            reason: Some(reason),
        }
    }
}

/// Sort keys whitelisted for the customer listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSortKey {
    CreatedAt,
    Email,
    LastName,
    Company,
    Status,
}

impl CustomerSortKey {
    #[must_use]
    pub const fn as_column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Email => "email",
            Self::LastName => "last_name",
            Self::Company => "company",
            Self::Status => "status",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" | "registered" => Some(Self::CreatedAt),
            "email" => Some(Self::Email),
            "last_name" | "name" => Some(Self::LastName),
            "company" => Some(Self::Company),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter, sort, and pagination for the customer listing.
#[derive(Debug, Clone)]
pub struct CustomerQuery {
    /// Empty means all statuses.
    pub statuses: Vec<CustomerStatus>,
    /// Case-insensitive substring match across name, email, and company.
    pub search: Option<String>,
    pub registered_from: Option<DateTime<Utc>>,
    pub registered_to: Option<DateTime<Utc>>,
    pub sort: CustomerSortKey,
    pub order: SortOrder,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            search: None,
            registered_from: None,
            registered_to: None,
            sort: CustomerSortKey::CreatedAt,
            order: SortOrder::Desc,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CustomerQuery {
    /// Clamp page and limit into usable ranges.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPage {
    pub customers: Vec<CustomerRecord>,
    pub total: i64,
    pub page_count: i64,
}

pub(crate) fn page_count(total: i64, limit: u32) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total + i64::from(limit) - 1) / i64::from(limit)
}

/// Reason column value for a transition: the reason itself for rejections,
/// `NULL` for everything else so prior rejections do not linger.
fn persisted_rejection_reason(change: &StatusChange) -> Option<String> {
    (change.status == CustomerStatus::Rejected)
        .then(|| change.reason.clone())
        .flatten()
}

/// Customer directory contract.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Apply one lifecycle transition as a single update scoped by target
    /// id (last-write-wins; there is no optimistic concurrency here).
    /// Returns the updated record, or `None` when the id does not exist.
    async fn set_status(&self, id: Uuid, change: &StatusChange)
        -> Result<Option<CustomerRecord>>;

    async fn list(&self, query: &CustomerQuery) -> Result<CustomerPage>;
}

const CUSTOMER_COLUMNS: &str = "id, email, first_name, last_name, company, status, \
     created_at, approved_by, approved_at, rejection_reason";

fn map_customer(row: &sqlx::postgres::PgRow) -> Result<CustomerRecord> {
    let status: String = row.get("status");
    let status = CustomerStatus::parse(&status)
        .ok_or_else(|| anyhow!("unknown customer status in directory: {status}"))?;
    Ok(CustomerRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        company: row.get("company"),
        status,
        created_at: row.get("created_at"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
        rejection_reason: row.get("rejection_reason"),
    })
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CustomerQuery) {
    builder.push(" WHERE TRUE");
    if !query.statuses.is_empty() {
        let statuses: Vec<String> = query
            .statuses
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();
        builder.push(" AND status = ANY(");
        builder.push_bind(statuses);
        builder.push(")");
    }
    if let Some(search) = query.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let pattern = format!("%{search}%");
            builder.push(" AND (email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR first_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR last_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR company ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
    }
    if let Some(from) = query.registered_from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.registered_to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }
}

/// Postgres-backed customer directory.
#[derive(Debug, Clone)]
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn set_status(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<CustomerRecord>> {
        // Rejection is the only transition that persists its reason on the
        // record; any other transition clears it so a re-approved customer
        // does not carry a stale rejection. Other reasons live in the audit
        // details.
        let rejection_reason = persisted_rejection_reason(change);
        let query = format!(
            "UPDATE customer_accounts \
             SET status = $2, approved_by = $3, approved_at = NOW(), \
                 rejection_reason = $4 \
             WHERE id = $1 \
             RETURNING {CUSTOMER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(change.status.as_str())
            .bind(change.acted_by)
            .bind(rejection_reason)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update customer status")?;
        row.as_ref().map(map_customer).transpose()
    }

    async fn list(&self, query: &CustomerQuery) -> Result<CustomerPage> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_accounts");
        push_filters(&mut count_builder, query);
        let count_span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "customer_accounts count"
        );
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .instrument(count_span)
            .await
            .context("failed to count customers")?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_accounts"
        ));
        push_filters(&mut builder, query);
        builder.push(format!(
            " ORDER BY {} {}",
            query.sort.as_column(),
            query.order.as_sql()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(query.limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(query.page.saturating_sub(1)) * i64::from(query.limit));

        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "customer_accounts page"
        );
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list customers")?;

        let customers = rows
            .iter()
            .map(map_customer)
            .collect::<Result<Vec<_>>>()?;

        Ok(CustomerPage {
            customers,
            total,
            page_count: page_count(total, query.limit),
        })
    }
}
