//! Credential verifier contract.
//!
//! The hosted auth provider is opaque to this service: it validates
//! email/password pairs and owns the credential material. We only consume
//! the contract below; passwords are never stored here.

use async_trait::async_trait;
use uuid::Uuid;

mod http;

pub use http::HttpVerifier;

/// Opaque principal returned by a successful sign-in.
#[derive(Debug, Clone)]
pub struct VerifiedPrincipal {
    pub id: Uuid,
    /// Access token for the verifier's own session. Held only as long as
    /// needed to manage that session; never returned to untrusted contexts.
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifierError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential verifier unavailable")]
    Unavailable,
    #[error("invalid response from credential verifier")]
    InvalidResponse,
}

/// External credential-verification service.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Validate an email/password pair.
    async fn sign_in(&self, email: &str, password: &str)
        -> Result<VerifiedPrincipal, VerifierError>;

    /// Invalidate the verifier-side session for `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), VerifierError>;

    /// Create a new principal with the given credentials. Used when
    /// provisioning invited administrators.
    async fn provision(&self, email: &str, password: &str) -> Result<Uuid, VerifierError>;

    /// Rotate the password of the session's principal.
    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), VerifierError>;

    /// Trigger the provider's password-reset email.
    async fn send_password_reset(
        &self,
        email: &str,
        redirect_url: &str,
    ) -> Result<(), VerifierError>;
}
