//! # Custodia (Admin Access Control & Customer Lifecycle)
//!
//! `custodia` is the backend service behind the analytics platform's admin
//! dashboard. It governs who may act as an administrator, what each
//! administrator role may do, and the approval/rejection/suspension
//! lifecycle of customer accounts.
//!
//! ## Roles & Permissions
//!
//! Administrator roles form a closed set (`super_admin`, `admin`, `viewer`).
//! Each role maps to an immutable, precomputed permission table across the
//! `users:*`, `admin:*` and `settings:*` action families. The tables are
//! compiled into the binary; changing a role's grants requires a code
//! change and review, never a configuration edit.
//!
//! ## Sessions
//!
//! Login exchanges credentials with the external credential verifier, then
//! resolves the returned principal against the administrator directory. A
//! successful login stores a time-boxed session snapshot (24 hours,
//! absolute) carrying the role and its permission set. Expiry is evaluated
//! lazily on every read; there is no silent renewal, and permission changes
//! only take effect at the next login.
//!
//! ## Audit
//!
//! Every privileged mutation appends an immutable audit entry after the
//! underlying write succeeds. Audit failures are reported on the error
//! channel but never roll back or fail the business operation.

pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod directory;
pub mod invite;
pub mod verifier;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
