//! Administrator directory: records, contract, and Postgres storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::permissions::Role;

/// Administrator identity record. Never hard-deleted; deactivation flips
/// `is_active` so the audit trail keeps resolving.
#[derive(Debug, Clone)]
pub struct Administrator {
    pub id: Uuid,
    /// Principal id at the credential verifier.
    pub auth_user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Persisted role string; resolved to a permission table at session
    /// build time, with unknown values granting nothing.
    pub role: String,
    pub is_active: bool,
    pub needs_password_reset: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub invited_by: Option<Uuid>,
}

/// Fields for a new administrator record.
#[derive(Debug, Clone)]
pub struct NewAdministrator {
    pub auth_user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub needs_password_reset: bool,
    pub invited_by: Option<Uuid>,
}

/// Administrator directory contract.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Resolve a verifier principal to an administrator. Always filtered to
    /// `is_active = true`; an inactive administrator cannot authenticate.
    async fn find_active_by_principal(&self, auth_user_id: Uuid) -> Result<Option<Administrator>>;

    /// Case-insensitive email lookup, active or not.
    async fn find_by_email(&self, email: &str) -> Result<Option<Administrator>>;

    async fn create(&self, admin: NewAdministrator) -> Result<Administrator>;

    /// Flip the active flag. Returns the updated record, or `None` when the
    /// id does not exist.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Administrator>>;

    /// Change the role. Does not touch already-issued session snapshots.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Administrator>>;

    /// Touch `last_login_at`.
    async fn record_login(&self, id: Uuid) -> Result<()>;

    async fn list(&self) -> Result<Vec<Administrator>>;
}

const ADMIN_COLUMNS: &str = "id, auth_user_id, email, first_name, last_name, role, \
     is_active, needs_password_reset, created_at, last_login_at, invited_by";

fn map_admin(row: &sqlx::postgres::PgRow) -> Administrator {
    Administrator {
        id: row.get("id"),
        auth_user_id: row.get("auth_user_id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role: row.get("role"),
        is_active: row.get("is_active"),
        needs_password_reset: row.get("needs_password_reset"),
        created_at: row.get("created_at"),
        last_login_at: row.get("last_login_at"),
        invited_by: row.get("invited_by"),
    }
}

/// Postgres-backed administrator directory.
#[derive(Debug, Clone)]
pub struct PgAdminDirectory {
    pool: PgPool,
}

impl PgAdminDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminDirectory for PgAdminDirectory {
    async fn find_active_by_principal(&self, auth_user_id: Uuid) -> Result<Option<Administrator>> {
        let query = format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users WHERE auth_user_id = $1 AND is_active = TRUE"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(auth_user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup administrator by principal")?;
        Ok(row.as_ref().map(map_admin))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Administrator>> {
        let query =
            format!("SELECT {ADMIN_COLUMNS} FROM admin_users WHERE LOWER(email) = LOWER($1)");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup administrator by email")?;
        Ok(row.as_ref().map(map_admin))
    }

    async fn create(&self, admin: NewAdministrator) -> Result<Administrator> {
        let query = format!(
            "INSERT INTO admin_users \
                (auth_user_id, email, first_name, last_name, role, needs_password_reset, invited_by) \
             VALUES ($1, LOWER($2), $3, $4, $5, $6, $7) \
             RETURNING {ADMIN_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(admin.auth_user_id)
            .bind(&admin.email)
            .bind(&admin.first_name)
            .bind(&admin.last_name)
            .bind(admin.role.as_str())
            .bind(admin.needs_password_reset)
            .bind(admin.invited_by)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert administrator")?;
        Ok(map_admin(&row))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Administrator>> {
        let query = format!(
            "UPDATE admin_users SET is_active = $2 WHERE id = $1 RETURNING {ADMIN_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update administrator active flag")?;
        Ok(row.as_ref().map(map_admin))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Administrator>> {
        let query =
            format!("UPDATE admin_users SET role = $2 WHERE id = $1 RETURNING {ADMIN_COLUMNS}");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update administrator role")?;
        Ok(row.as_ref().map(map_admin))
    }

    async fn record_login(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE admin_users SET last_login_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record administrator login")?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Administrator>> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admin_users ORDER BY created_at DESC");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list administrators")?;
        Ok(rows.iter().map(map_admin).collect())
    }
}
