//! HTTP handlers and the glue shared between them: session cookie
//! handling and the error-to-response mapping.

pub mod admins;
pub mod auth;
pub mod customers;
pub mod health;
pub mod types;

use axum::{
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::auth::error::AuthError;
use crate::auth::session::ADMIN_SESSION_KEY;
use types::ErrorBody;

/// Map a core error to a response. Authentication and authorization
/// failures stay short and non-technical; internal details never leave the
/// server log.
pub(crate) fn error_response(err: AuthError) -> Response {
    let status = match &err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::NotAnAdministrator
        | AuthError::PasswordResetRequired
        | AuthError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::AlreadyExists => StatusCode::CONFLICT,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Internal(source) => {
            error!("operation failed: {source:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Session token from the bearer header or the admin session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        // Pairs without '=' are skipped, not fatal; a malformed cookie must
        // not shadow a valid session cookie later in the header.
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == ADMIN_SESSION_KEY {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Secure `HttpOnly` cookie carrying the session token.
pub(crate) fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{ADMIN_SESSION_KEY}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{ADMIN_SESSION_KEY}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_and_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_session_token(&headers).is_none());

        headers.insert(
            COOKIE,
            format!("other=1; {ADMIN_SESSION_KEY}=tok-abc; theme=dark")
                .parse()
                .unwrap(),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-abc"));

        headers.insert(AUTHORIZATION, "Bearer tok-bearer".parse().unwrap());
        // Bearer wins over the cookie.
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("tok-bearer")
        );
    }

    #[test]
    fn malformed_cookie_pair_does_not_hide_the_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("garbage; {ADMIN_SESSION_KEY}=tok-abc")
                .parse()
                .unwrap(),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok-abc"));
    }

    #[test]
    fn session_cookie_flags() {
        let cookie = session_cookie("tok", 86_400, true).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Secure"));
        assert!(value.contains("Max-Age=86400"));

        let cleared = clear_session_cookie(false).unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }
}
