//! The admin auth service: login protocol, permission checks, and customer
//! lifecycle transitions.
//!
//! Flow overview:
//! 1) Login: verifier sign-in -> active administrator lookup -> policy
//!    gates -> session snapshot with a 24h absolute expiry.
//! 2) Privileged operations: permission check against the cached session
//!    set, validation, then a single directory update.
//! 3) Audit: appended strictly after a successful mutation; append failure
//!    is logged and swallowed.
//!
//! All durable state lives in the injected directories and audit log; the
//! only state held here is the session store handle. There are no global
//! singletons, so every test can run against isolated fixtures.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use super::error::AuthError;
use super::permissions::Permission;
use super::session::{Session, SessionStore};
use super::utils::normalize_email;
use crate::audit::{AuditAction, AuditEntry, AuditLog, TargetType};
use crate::directory::admins::{AdminDirectory, Administrator};
use crate::directory::customers::{
    CustomerDirectory, CustomerPage, CustomerQuery, CustomerRecord, StatusChange,
};
use crate::verifier::{CredentialVerifier, VerifierError};

/// Orchestrates authentication and privileged operations for one browser
/// context. Cheap to construct per request; all handles are shared.
#[derive(Clone)]
pub struct AdminAuthService {
    verifier: Arc<dyn CredentialVerifier>,
    admins: Arc<dyn AdminDirectory>,
    customers: Arc<dyn CustomerDirectory>,
    audit: Arc<dyn AuditLog>,
    sessions: SessionStore,
}

impl AdminAuthService {
    #[must_use]
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        admins: Arc<dyn AdminDirectory>,
        customers: Arc<dyn CustomerDirectory>,
        audit: Arc<dyn AuditLog>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            verifier,
            admins,
            customers,
            audit,
            sessions,
        }
    }

    /// Authenticate an administrator and establish a session.
    ///
    /// Credential failures collapse into one generic error so the response
    /// never reveals whether the email exists. A principal that
    /// authenticates but has no active administrator record is signed back
    /// out of the verifier to avoid a half-authenticated state.
    ///
    /// # Errors
    /// See [`AuthError`] for the failure taxonomy.
    pub async fn login(&self, email: &str, password: &str) -> Result<Administrator, AuthError> {
        let email = normalize_email(email);
        let principal = self
            .verifier
            .sign_in(&email, password)
            .await
            .map_err(|err| match err {
                VerifierError::InvalidCredentials => AuthError::InvalidCredentials,
                VerifierError::Unavailable => AuthError::Unavailable,
                VerifierError::InvalidResponse => {
                    AuthError::Internal(anyhow::anyhow!("verifier returned an invalid response"))
                }
            })?;

        let admin = self
            .admins
            .find_active_by_principal(principal.id)
            .await
            .map_err(AuthError::Internal)?;
        let Some(admin) = admin else {
            self.sign_out_upstream(&principal.access_token).await;
            return Err(AuthError::NotAnAdministrator);
        };

        // Provisioned-but-never-rotated temporary passwords may not be
        // used; the account must go through a reset first.
        if admin.needs_password_reset {
            self.sign_out_upstream(&principal.access_token).await;
            return Err(AuthError::PasswordResetRequired);
        }

        if let Err(err) = self.admins.record_login(admin.id).await {
            warn!("failed to record administrator login time: {err}");
        }

        self.sessions.save(&admin, &principal.access_token);
        Ok(admin)
    }

    /// End the session. Audit and upstream sign-out are best effort; the
    /// local session is cleared unconditionally so the caller is never
    /// stuck signed in after requesting logout.
    pub async fn logout(&self) {
        if let Some(session) = self.sessions.current() {
            let entry = AuditEntry::for_actor(
                &session,
                AuditAction::Logout,
                TargetType::Administrator,
                session.admin_id(),
                json!({ "email": session.email() }),
            );
            if let Err(err) = self.audit.append(entry).await {
                error!("failed to append logout audit entry: {err}");
            }
            if let Some(token) = self.sessions.verifier_token() {
                self.sign_out_upstream(&token).await;
            }
        }
        self.sessions.clear();
    }

    /// Session snapshot for the current context, if valid.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Permission check against the session's cached set. No session means
    /// no permissions.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.sessions
            .current()
            .is_some_and(|session| session.allows(permission))
    }

    /// Gate for privileged operations; raised before any persistence
    /// mutation is attempted.
    ///
    /// # Errors
    /// `AuthError::PermissionDenied` naming the missing action.
    pub fn require_permission(&self, permission: Permission) -> Result<Session, AuthError> {
        match self.sessions.current() {
            Some(session) if session.allows(permission) => Ok(session),
            _ => Err(AuthError::PermissionDenied {
                required: permission,
            }),
        }
    }

    /// Approve a pending customer. The reason is optional.
    ///
    /// # Errors
    /// Permission, not-found, or persistence failures.
    pub async fn approve_customer(
        &self,
        customer_id: Uuid,
        reason: Option<&str>,
    ) -> Result<CustomerRecord, AuthError> {
        let session = self.require_permission(Permission::UsersApprove)?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let change = StatusChange::approval(session.admin_id(), reason.map(String::from));
        self.transition(&session, customer_id, &change, AuditAction::UserApproved)
            .await
    }

    /// Reject a customer. A non-empty reason is mandatory; a rejection
    /// without one is not auditable and is refused here, before any
    /// persistence call.
    ///
    /// # Errors
    /// Validation, permission, not-found, or persistence failures.
    pub async fn reject_customer(
        &self,
        customer_id: Uuid,
        reason: &str,
    ) -> Result<CustomerRecord, AuthError> {
        let session = self.require_permission(Permission::UsersReject)?;
        let reason = required_reason(reason, "rejection")?;
        let change = StatusChange::rejection(session.admin_id(), reason);
        self.transition(&session, customer_id, &change, AuditAction::UserRejected)
            .await
    }

    /// Suspend an approved or active customer. Reason mandatory, as for
    /// rejection.
    ///
    /// # Errors
    /// Validation, permission, not-found, or persistence failures.
    pub async fn suspend_customer(
        &self,
        customer_id: Uuid,
        reason: &str,
    ) -> Result<CustomerRecord, AuthError> {
        let session = self.require_permission(Permission::UsersSuspend)?;
        let reason = required_reason(reason, "suspension")?;
        let change = StatusChange::suspension(session.admin_id(), reason);
        self.transition(&session, customer_id, &change, AuditAction::UserSuspended)
            .await
    }

    /// Filtered, paginated customer listing.
    ///
    /// # Errors
    /// Permission or persistence failures.
    pub async fn list_customers(&self, query: CustomerQuery) -> Result<CustomerPage, AuthError> {
        self.require_permission(Permission::UsersView)?;
        self.customers
            .list(&query.normalize())
            .await
            .map_err(AuthError::Internal)
    }

    /// Trigger the verifier's password-reset email. Always reports success
    /// to the caller so the endpoint cannot be used to probe for accounts;
    /// failures are logged server-side.
    pub async fn request_password_reset(&self, email: &str, redirect_url: &str) {
        let email = normalize_email(email);
        if let Err(err) = self.verifier.send_password_reset(&email, redirect_url).await {
            warn!("failed to dispatch password reset email: {err}");
        }
    }

    async fn transition(
        &self,
        session: &Session,
        customer_id: Uuid,
        change: &StatusChange,
        action: AuditAction,
    ) -> Result<CustomerRecord, AuthError> {
        let updated = self
            .customers
            .set_status(customer_id, change)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::NotFound)?;

        // The mutation succeeded; from here the operation's outcome no
        // longer depends on the audit write.
        let entry = AuditEntry::for_actor(
            session,
            action,
            TargetType::Customer,
            customer_id,
            json!({
                "email": updated.email,
                "status": updated.status.as_str(),
                "reason": change.reason,
            }),
        );
        if let Err(err) = self.audit.append(entry).await {
            error!("failed to append audit entry for {}: {err}", action.as_str());
        }
        Ok(updated)
    }

    async fn sign_out_upstream(&self, access_token: &str) {
        if let Err(err) = self.verifier.sign_out(access_token).await {
            warn!("failed to sign principal out of the credential verifier: {err}");
        }
    }
}

fn required_reason(reason: &str, operation: &str) -> Result<String, AuthError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(AuthError::validation(format!(
            "a {operation} reason is required"
        )));
    }
    Ok(trimmed.to_string())
}
