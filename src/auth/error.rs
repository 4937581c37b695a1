//! Error taxonomy for admin authentication and privileged operations.

use super::permissions::Permission;

/// Failure kinds surfaced by the auth service and invitation service.
///
/// Authentication failures stay generic on purpose: the message never
/// reveals whether an account exists. Authorization and policy-gate
/// failures are distinct because the caller has already proven identity.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials. Same message for unknown email and wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Credentials were valid but the principal is not an active
    /// administrator.
    #[error("you do not have admin access to this system")]
    NotAnAdministrator,

    /// The administrator is flagged for a password rotation that has not
    /// happened yet; the provisioned temporary password may not be used.
    #[error("your password must be reset before signing in; contact an administrator")]
    PasswordResetRequired,

    /// Authenticated but lacking the action for this operation. Raised
    /// before any persistence mutation is attempted.
    #[error("permission denied: requires {required}")]
    PermissionDenied { required: Permission },

    /// Input rejected by the core before any persistence call.
    #[error("{0}")]
    Validation(String),

    /// An administrator with the given email already exists.
    #[error("an administrator with this email already exists")]
    AlreadyExists,

    /// The target record does not exist.
    #[error("not found")]
    NotFound,

    /// The external verifier or store could not be reached.
    #[error("service temporarily unavailable")]
    Unavailable,

    /// Persistence or transport failure; details stay on the server log.
    #[error("operation failed")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
