//! OpenAPI document for the admin API, served at `/v1/openapi.json`.

use axum::response::Json;
use utoipa::OpenApi;

use crate::api::handlers::{admins, auth, customers, health, types};
use crate::auth::session::SessionSnapshot;
use crate::directory::customers::{CustomerPage, CustomerRecord, CustomerStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::session,
        auth::logout,
        auth::reset,
        customers::list,
        customers::approve,
        customers::reject,
        customers::suspend,
        admins::list,
        admins::invite,
        admins::deactivate,
        admins::reactivate,
        admins::update_role,
    ),
    components(schemas(
        health::Health,
        SessionSnapshot,
        CustomerPage,
        CustomerRecord,
        CustomerStatus,
        types::AdminProfile,
        types::ErrorBody,
        types::InviteBody,
        types::InviteResponse,
        types::LoginRequest,
        types::PasswordResetRequest,
        types::ReasonBody,
        types::RoleBody,
    )),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "auth", description = "Administrator sessions"),
        (name = "customers", description = "Customer lifecycle"),
        (name = "admins", description = "Administrator management")
    )
)]
pub struct ApiDoc;

pub async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
