//! Session endpoints: login, session introspection, logout, reset.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    clear_session_cookie, error_response, extract_session_token, session_cookie,
    types::{AdminProfile, LoginRequest, PasswordResetRequest},
};
use crate::api::state::AppState;
use crate::auth::session::SessionSnapshot;
use crate::auth::utils::generate_session_token;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = AdminProfile),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Not an administrator, or password reset required"),
        (status = 503, description = "Credential verifier unavailable")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    let Ok(token) = generate_session_token() else {
        error!("failed to generate a session token");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let service = state.auth_service(&token);
    match service.login(&request.email, &request.password).await {
        Ok(admin) => {
            info!(email = %admin.email, "administrator signed in");
            let mut headers = HeaderMap::new();
            if let Ok(cookie) = session_cookie(
                &token,
                state.config().session_ttl_seconds,
                state.config().cookie_secure,
            ) {
                headers.insert(SET_COOKIE, cookie);
            }
            (StatusCode::OK, headers, Json(AdminProfile::from(admin))).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionSnapshot),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    // A missing cookie is simply "no session"; nothing about auth state is
    // leaked.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match state.auth_service(&token).current_session() {
        Some(session) => (StatusCode::OK, Json(session.snapshot().clone())).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        state.auth_service(&token).logout().await;
    }

    // Always clear the cookie, even when no session was found.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config().cookie_secure) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 204, description = "Reset email queued if the account exists")
    ),
    tag = "auth"
)]
pub async fn reset(
    state: Extension<Arc<AppState>>,
    Json(request): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    // Deliberately fire-and-forget: the response never reveals whether the
    // email matched an account.
    state
        .auth_service("password-reset")
        .request_password_reset(&request.email, &state.config().login_url)
        .await;
    StatusCode::NO_CONTENT
}
