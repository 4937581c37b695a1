//! Shared application state handed to every handler.

use sqlx::PgPool;
use std::sync::Arc;

use crate::audit::PgAuditLog;
use crate::auth::session::SessionBackend;
use crate::auth::utils::hash_session_token;
use crate::auth::{AdminAuthService, SessionStore};
use crate::directory::admins::PgAdminDirectory;
use crate::directory::customers::PgCustomerDirectory;
use crate::invite::{InvitationService, InviteSender};
use crate::verifier::CredentialVerifier;

/// Runtime settings that shape the delivery surface.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// URL administrators are sent to when signing in, used in invite and
    /// password-reset emails.
    pub login_url: String,
    /// Origin of the admin dashboard, allowed by CORS.
    pub dashboard_origin: String,
    pub session_ttl_seconds: i64,
    pub cookie_secure: bool,
}

pub struct AppState {
    pool: PgPool,
    verifier: Arc<dyn CredentialVerifier>,
    sessions: Arc<dyn SessionBackend>,
    sender: Arc<dyn InviteSender>,
    config: AppConfig,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        verifier: Arc<dyn CredentialVerifier>,
        sessions: Arc<dyn SessionBackend>,
        sender: Arc<dyn InviteSender>,
        config: AppConfig,
    ) -> Self {
        Self {
            pool,
            verifier,
            sessions,
            sender,
            config,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Builds an [`AdminAuthService`] scoped to the caller's session token.
    ///
    /// Each browser context gets its own storage namespace, keyed by the
    /// hashed token so the raw token never reaches the backend.
    #[must_use]
    pub fn auth_service(&self, token: &str) -> AdminAuthService {
        let sessions = SessionStore::scoped(
            Arc::clone(&self.sessions),
            self.config.session_ttl_seconds,
            &hash_session_token(token),
        );
        AdminAuthService::new(
            Arc::clone(&self.verifier),
            Arc::new(PgAdminDirectory::new(self.pool.clone())),
            Arc::new(PgCustomerDirectory::new(self.pool.clone())),
            Arc::new(PgAuditLog::new(self.pool.clone())),
            sessions,
        )
    }

    #[must_use]
    pub fn invitation_service(&self) -> InvitationService {
        InvitationService::new(
            Arc::clone(&self.verifier),
            Arc::new(PgAdminDirectory::new(self.pool.clone())),
            Arc::new(PgAuditLog::new(self.pool.clone())),
            Arc::clone(&self.sender),
            self.config.login_url.clone(),
        )
    }
}
