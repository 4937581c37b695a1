//! Append-only audit trail for privileged mutations.
//!
//! Entries are written only after the underlying mutation succeeds; a
//! failed append is reported on the error channel and never rolls back or
//! fails the business operation. Nothing in this service reads the trail
//! back; retrieval lives elsewhere.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::session::Session;

/// Privileged actions recorded in the trail, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Logout,
    UserApproved,
    UserRejected,
    UserSuspended,
    AdminInvited,
    AdminDeactivated,
    AdminReactivated,
    AdminRoleUpdated,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::UserApproved => "user_approved",
            Self::UserRejected => "user_rejected",
            Self::UserSuspended => "user_suspended",
            Self::AdminInvited => "admin_invited",
            Self::AdminDeactivated => "admin_deactivated",
            Self::AdminReactivated => "admin_reactivated",
            Self::AdminRoleUpdated => "admin_role_updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Customer,
    Administrator,
}

impl TargetType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Administrator => "administrator",
        }
    }
}

/// Immutable audit record. The acting administrator's email is denormalized
/// so entries stay meaningful after the account is deactivated.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub admin_user_id: Uuid,
    pub admin_email: String,
    pub action: AuditAction,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub details: Value,
}

impl AuditEntry {
    /// Entry attributed to the acting session.
    #[must_use]
    pub fn for_actor(
        actor: &Session,
        action: AuditAction,
        target_type: TargetType,
        target_id: Uuid,
        details: Value,
    ) -> Self {
        Self {
            admin_user_id: actor.admin_id(),
            admin_email: actor.email().to_string(),
            action,
            target_type,
            target_id,
            details,
        }
    }
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;
}

/// Postgres-backed audit log.
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let details =
            serde_json::to_string(&entry.details).context("failed to serialize audit details")?;
        let query = r"
            INSERT INTO admin_audit_log
                (admin_user_id, admin_email, action, target_type, target_id, details)
            VALUES ($1, $2, $3, $4, $5, $6::jsonb)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(entry.admin_user_id)
            .bind(&entry.admin_email)
            .bind(entry.action.as_str())
            .bind(entry.target_type.as_str())
            .bind(entry.target_id)
            .bind(details)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to append audit entry")?;
        Ok(())
    }
}
