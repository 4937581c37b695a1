//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments and maps them to the appropriate action,
//! such as starting the API server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let verifier_url = matches
        .get_one::<String>(commands::ARG_VERIFIER_URL)
        .cloned()
        .context("missing required argument: --verifier-url")?;
    let verifier_service_key = matches
        .get_one::<String>(commands::ARG_VERIFIER_SERVICE_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --verifier-service-key")?;
    let login_url = matches
        .get_one::<String>(commands::ARG_LOGIN_URL)
        .cloned()
        .context("missing required argument: --login-url")?;
    let dashboard_origin = matches
        .get_one::<String>(commands::ARG_DASHBOARD_ORIGIN)
        .cloned()
        .context("missing required argument: --dashboard-origin")?;
    let session_ttl_seconds = matches
        .get_one::<i64>(commands::ARG_SESSION_TTL_SECONDS)
        .copied()
        .unwrap_or(crate::auth::session::DEFAULT_SESSION_TTL_SECONDS);
    let cookie_secure = matches.get_flag(commands::ARG_COOKIE_SECURE);

    Ok(Action::Server(Args {
        port,
        dsn,
        verifier_url,
        verifier_service_key,
        login_url,
        dashboard_origin,
        session_ttl_seconds,
        cookie_secure,
    }))
}
