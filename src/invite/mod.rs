//! Administrator provisioning: invitations, deactivation, role changes.
//!
//! An invitation crosses two failure domains: the directory/verifier write
//! and the notification dispatch. They are deliberately separate stages; a
//! failed email never undoes a created administrator. Instead the outcome
//! carries the temporary password back to the caller exactly when the email
//! did not go out, so the credential can be shared out-of-band. The
//! temporary password is never persisted anywhere.

use std::sync::Arc;

use anyhow::Result;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntry, AuditLog, TargetType};
use crate::auth::error::AuthError;
use crate::auth::permissions::Role;
use crate::auth::session::Session;
use crate::auth::utils::{normalize_email, valid_email};
use crate::directory::admins::{AdminDirectory, Administrator, NewAdministrator};
use crate::verifier::{CredentialVerifier, VerifierError};

/// Minimum temporary password length; generated ones are longer.
pub const MIN_TEMP_PASSWORD_LEN: usize = 12;
const TEMP_PASSWORD_LEN: usize = 16;

// Ambiguous glyphs (l/1, O/0) are left out of the alphabets.
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+";

/// High-entropy temporary password with at least one character from each
/// class.
#[must_use]
pub fn generate_temp_password() -> String {
    let mut rng = OsRng;
    let pool: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS].concat();

    let mut chars: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS]
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();
    while chars.len() < TEMP_PASSWORD_LEN {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);
    String::from_utf8(chars).unwrap_or_default()
}

/// Invitation email payload.
#[derive(Debug, Clone)]
pub struct InviteEmail {
    pub to: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub temp_password: String,
    pub login_url: String,
}

/// Notification seam. Delivery failure is non-fatal to the invitation.
pub trait InviteSender: Send + Sync {
    /// Deliver the invitation or return an error.
    ///
    /// # Errors
    /// Any delivery failure; the caller degrades gracefully.
    fn send(&self, email: &InviteEmail) -> Result<()>;
}

/// Local dev sender that logs instead of delivering. The temporary
/// password is not written to the log.
#[derive(Debug, Clone)]
pub struct LogInviteSender;

impl InviteSender for LogInviteSender {
    fn send(&self, email: &InviteEmail) -> Result<()> {
        info!(
            to = %email.to,
            role = %email.role,
            login_url = %email.login_url,
            "invitation email send stub"
        );
        Ok(())
    }
}

/// New-administrator request as received from the dashboard.
#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Result of a successful invitation. `temp_password` is populated exactly
/// when the notification did not go out.
#[derive(Debug)]
pub struct InviteOutcome {
    pub admin: Administrator,
    pub notified: bool,
    pub temp_password: Option<String>,
}

/// Provisions administrators end-to-end. Permission gates (`admin:create`,
/// `admin:update`, `admin:delete`) are enforced at the call site.
#[derive(Clone)]
pub struct InvitationService {
    verifier: Arc<dyn CredentialVerifier>,
    admins: Arc<dyn AdminDirectory>,
    audit: Arc<dyn AuditLog>,
    sender: Arc<dyn InviteSender>,
    login_url: String,
}

impl InvitationService {
    #[must_use]
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        admins: Arc<dyn AdminDirectory>,
        audit: Arc<dyn AuditLog>,
        sender: Arc<dyn InviteSender>,
        login_url: String,
    ) -> Self {
        Self {
            verifier,
            admins,
            audit,
            sender,
            login_url,
        }
    }

    /// Create a verifier principal and directory record for a new
    /// administrator, then attempt the invitation email.
    ///
    /// # Errors
    /// Validation, duplicate email, or verifier/persistence failures.
    /// Notification failure is not an error; see [`InviteOutcome`].
    pub async fn invite(
        &self,
        request: InviteRequest,
        actor: &Session,
    ) -> Result<InviteOutcome, AuthError> {
        let email = normalize_email(&request.email);
        if !valid_email(&email) {
            return Err(AuthError::validation("a valid email address is required"));
        }
        let first_name = request.first_name.trim().to_string();
        let last_name = request.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AuthError::validation("first and last name are required"));
        }

        // Case-insensitive uniqueness, checked before any verifier call so
        // a duplicate never creates a stray principal.
        if self
            .admins
            .find_by_email(&email)
            .await
            .map_err(AuthError::Internal)?
            .is_some()
        {
            return Err(AuthError::AlreadyExists);
        }

        let temp_password = generate_temp_password();
        let auth_user_id = self
            .verifier
            .provision(&email, &temp_password)
            .await
            .map_err(|err| match err {
                VerifierError::Unavailable => AuthError::Unavailable,
                _ => AuthError::Internal(anyhow::anyhow!(
                    "credential verifier refused to provision the principal"
                )),
            })?;

        let admin = self
            .admins
            .create(NewAdministrator {
                auth_user_id,
                email: email.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                role: request.role,
                // First login is blocked until the temporary password is
                // rotated.
                needs_password_reset: true,
                invited_by: Some(actor.admin_id()),
            })
            .await
            .map_err(AuthError::Internal)?;

        self.record_audit(
            actor,
            AuditAction::AdminInvited,
            admin.id,
            json!({ "email": admin.email, "role": admin.role }),
        )
        .await;

        let payload = InviteEmail {
            to: admin.email.clone(),
            first_name,
            last_name,
            role: request.role.as_str().to_string(),
            temp_password: temp_password.clone(),
            login_url: self.login_url.clone(),
        };
        let notified = match self.sender.send(&payload) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    email = %admin.email,
                    "invitation email failed, temporary credential must be shared out-of-band: {err}"
                );
                false
            }
        };

        Ok(InviteOutcome {
            admin,
            notified,
            temp_password: (!notified).then_some(temp_password),
        })
    }

    /// Deactivate an administrator. Records stay in the directory so the
    /// audit trail keeps resolving.
    ///
    /// # Errors
    /// Not-found or persistence failures.
    pub async fn deactivate(
        &self,
        admin_id: Uuid,
        actor: &Session,
    ) -> Result<Administrator, AuthError> {
        let admin = self
            .admins
            .set_active(admin_id, false)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::NotFound)?;
        self.record_audit(
            actor,
            AuditAction::AdminDeactivated,
            admin.id,
            json!({ "email": admin.email }),
        )
        .await;
        Ok(admin)
    }

    /// # Errors
    /// Not-found or persistence failures.
    pub async fn reactivate(
        &self,
        admin_id: Uuid,
        actor: &Session,
    ) -> Result<Administrator, AuthError> {
        let admin = self
            .admins
            .set_active(admin_id, true)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::NotFound)?;
        self.record_audit(
            actor,
            AuditAction::AdminReactivated,
            admin.id,
            json!({ "email": admin.email }),
        )
        .await;
        Ok(admin)
    }

    /// Change an administrator's role. Sessions already issued keep their
    /// login-time permission set until re-login.
    ///
    /// # Errors
    /// Not-found or persistence failures.
    pub async fn update_role(
        &self,
        admin_id: Uuid,
        role: Role,
        actor: &Session,
    ) -> Result<Administrator, AuthError> {
        let admin = self
            .admins
            .set_role(admin_id, role)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::NotFound)?;
        self.record_audit(
            actor,
            AuditAction::AdminRoleUpdated,
            admin.id,
            json!({ "email": admin.email, "role": role.as_str() }),
        )
        .await;
        Ok(admin)
    }

    /// # Errors
    /// Persistence failures.
    pub async fn list(&self) -> Result<Vec<Administrator>, AuthError> {
        self.admins.list().await.map_err(AuthError::Internal)
    }

    async fn record_audit(
        &self,
        actor: &Session,
        action: AuditAction,
        target_id: Uuid,
        details: serde_json::Value,
    ) {
        let entry = AuditEntry::for_actor(
            actor,
            action,
            TargetType::Administrator,
            target_id,
            details,
        );
        if let Err(err) = self.audit.append(entry).await {
            error!("failed to append audit entry for {}: {err}", action.as_str());
        }
    }
}
