use crate::{
    api::{self, AppConfig, AppState},
    auth::session::MemorySessionBackend,
    invite::LogInviteSender,
    verifier::HttpVerifier,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub verifier_url: String,
    pub verifier_service_key: SecretString,
    pub login_url: String,
    pub dashboard_origin: String,
    pub session_ttl_seconds: i64,
    pub cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or verifier cannot be reached, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let verifier = HttpVerifier::new(&args.verifier_url, args.verifier_service_key)?;

    let state = Arc::new(AppState::new(
        pool,
        Arc::new(verifier),
        Arc::new(MemorySessionBackend::new()),
        Arc::new(LogInviteSender),
        AppConfig {
            login_url: args.login_url,
            dashboard_origin: args.dashboard_origin,
            session_ttl_seconds: args.session_ttl_seconds,
            cookie_secure: args.cookie_secure,
        },
    ));

    api::serve(args.port, state).await
}
