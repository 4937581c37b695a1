//! Administrator management endpoints.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error_response, extract_session_token,
    types::{AdminProfile, ErrorBody, InviteBody, InviteResponse, RoleBody},
};
use crate::api::state::AppState;
use crate::auth::{AuthError, Permission, Role, Session};
use crate::invite::InviteRequest;

/// Resolves the caller's session and checks one permission up front.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<Session, AuthError> {
    let token = extract_session_token(headers).ok_or(AuthError::InvalidCredentials)?;
    state.auth_service(&token).require_permission(permission)
}

#[utoipa::path(
    get,
    path = "/v1/admins",
    responses(
        (status = 200, description = "All administrators", body = [AdminProfile]),
        (status = 401, description = "No active session"),
        (status = 403, description = "Missing the admin:view permission")
    ),
    tag = "admins"
)]
pub async fn list(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Err(err) = authorize(&state, &headers, Permission::AdminView) {
        return error_response(err);
    }
    match state.invitation_service().list().await {
        Ok(admins) => {
            let profiles: Vec<AdminProfile> =
                admins.into_iter().map(AdminProfile::from).collect();
            (StatusCode::OK, Json(profiles)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admins",
    request_body = InviteBody,
    responses(
        (status = 201, description = "Administrator invited", body = InviteResponse),
        (status = 403, description = "Missing the admin:create permission"),
        (status = 409, description = "An administrator with this email already exists"),
        (status = 422, description = "Invalid invitation", body = ErrorBody)
    ),
    tag = "admins"
)]
pub async fn invite(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Json(body): Json<InviteBody>,
) -> impl IntoResponse {
    let session = match authorize(&state, &headers, Permission::AdminCreate) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    let Some(role) = Role::parse(&body.role) else {
        return error_response(AuthError::validation(format!(
            "unknown role '{}'",
            body.role
        )));
    };
    let request = InviteRequest {
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        role,
    };
    match state.invitation_service().invite(request, &session).await {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(InviteResponse {
                admin: AdminProfile::from(outcome.admin),
                notified: outcome.notified,
                temp_password: outcome.temp_password,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admins/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Administrator id")),
    responses(
        (status = 200, description = "Administrator deactivated", body = AdminProfile),
        (status = 403, description = "Missing the admin:delete permission"),
        (status = 404, description = "No such administrator")
    ),
    tag = "admins"
)]
pub async fn deactivate(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let session = match authorize(&state, &headers, Permission::AdminDelete) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    match state.invitation_service().deactivate(id, &session).await {
        Ok(admin) => (StatusCode::OK, Json(AdminProfile::from(admin))).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/admins/{id}/reactivate",
    params(("id" = Uuid, Path, description = "Administrator id")),
    responses(
        (status = 200, description = "Administrator reactivated", body = AdminProfile),
        (status = 403, description = "Missing the admin:update permission"),
        (status = 404, description = "No such administrator")
    ),
    tag = "admins"
)]
pub async fn reactivate(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let session = match authorize(&state, &headers, Permission::AdminUpdate) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    match state.invitation_service().reactivate(id, &session).await {
        Ok(admin) => (StatusCode::OK, Json(AdminProfile::from(admin))).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    put,
    path = "/v1/admins/{id}/role",
    params(("id" = Uuid, Path, description = "Administrator id")),
    request_body = RoleBody,
    responses(
        (status = 200, description = "Role updated", body = AdminProfile),
        (status = 403, description = "Missing the admin:update permission"),
        (status = 404, description = "No such administrator"),
        (status = 422, description = "Unknown role", body = ErrorBody)
    ),
    tag = "admins"
)]
pub async fn update_role(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
    Json(body): Json<RoleBody>,
) -> impl IntoResponse {
    let session = match authorize(&state, &headers, Permission::AdminUpdate) {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    let Some(role) = Role::parse(&body.role) else {
        return error_response(AuthError::validation(format!(
            "unknown role '{}'",
            body.role
        )));
    };
    match state
        .invitation_service()
        .update_role(id, role, &session)
        .await
    {
        Ok(admin) => (StatusCode::OK, Json(AdminProfile::from(admin))).into_response(),
        Err(err) => error_response(err),
    }
}
