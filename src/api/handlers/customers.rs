//! Customer listing and lifecycle endpoints.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error_response, extract_session_token,
    types::{ErrorBody, ReasonBody},
};
use crate::api::state::AppState;
use crate::auth::AuthError;
use crate::directory::customers::{
    CustomerPage, CustomerQuery, CustomerRecord, CustomerSortKey, CustomerStatus, SortOrder,
};

/// Raw query string, validated and folded into a [`CustomerQuery`].
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(default)]
pub struct CustomerListParams {
    /// Comma separated status filter, e.g. `pending,approved`.
    pub status: Option<String>,
    pub search: Option<String>,
    pub registered_from: Option<chrono::DateTime<chrono::Utc>>,
    pub registered_to: Option<chrono::DateTime<chrono::Utc>>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl CustomerListParams {
    fn into_query(self) -> Result<CustomerQuery, AuthError> {
        let mut query = CustomerQuery::default();
        if let Some(raw) = self.status {
            let mut statuses = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = CustomerStatus::parse(&part.to_ascii_lowercase())
                    .ok_or_else(|| AuthError::validation(format!("unknown status '{part}'")))?;
                statuses.push(status);
            }
            query.statuses = statuses;
        }
        if let Some(sort) = self.sort {
            query.sort = CustomerSortKey::parse(&sort.to_ascii_lowercase())
                .ok_or_else(|| AuthError::validation(format!("unknown sort key '{sort}'")))?;
        }
        if let Some(order) = self.order {
            query.order = match order.to_ascii_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                other => {
                    return Err(AuthError::validation(format!("unknown sort order '{other}'")))
                }
            };
        }
        query.search = self.search.filter(|s| !s.trim().is_empty());
        query.registered_from = self.registered_from;
        query.registered_to = self.registered_to;
        if let Some(page) = self.page {
            query.page = page;
        }
        if let Some(limit) = self.limit {
            query.limit = limit;
        }
        Ok(query)
    }
}

#[utoipa::path(
    get,
    path = "/v1/customers",
    params(CustomerListParams),
    responses(
        (status = 200, description = "One page of customers", body = CustomerPage),
        (status = 401, description = "No active session"),
        (status = 403, description = "Missing the users:view permission"),
        (status = 422, description = "Invalid filter", body = ErrorBody)
    ),
    tag = "customers"
)]
pub async fn list(
    headers: HeaderMap,
    Query(params): Query<CustomerListParams>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(token) = extract_session_token(&headers) else {
        return error_response(AuthError::InvalidCredentials);
    };
    let query = match params.into_query() {
        Ok(query) => query,
        Err(err) => return error_response(err),
    };
    match state.auth_service(&token).list_customers(query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/customers/{id}/approve",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = ReasonBody,
    responses(
        (status = 200, description = "Customer approved", body = CustomerRecord),
        (status = 403, description = "Missing the users:approve permission"),
        (status = 404, description = "No such customer")
    ),
    tag = "customers"
)]
pub async fn approve(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
    body: Option<Json<ReasonBody>>,
) -> impl IntoResponse {
    let Some(token) = extract_session_token(&headers) else {
        return error_response(AuthError::InvalidCredentials);
    };
    let reason = body.and_then(|Json(body)| body.reason);
    match state
        .auth_service(&token)
        .approve_customer(id, reason.as_deref())
        .await
    {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/customers/{id}/reject",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = ReasonBody,
    responses(
        (status = 200, description = "Customer rejected", body = CustomerRecord),
        (status = 403, description = "Missing the users:reject permission"),
        (status = 404, description = "No such customer"),
        (status = 422, description = "A rejection reason is required", body = ErrorBody)
    ),
    tag = "customers"
)]
pub async fn reject(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
    body: Option<Json<ReasonBody>>,
) -> impl IntoResponse {
    let Some(token) = extract_session_token(&headers) else {
        return error_response(AuthError::InvalidCredentials);
    };
    let reason = body.and_then(|Json(body)| body.reason).unwrap_or_default();
    match state.auth_service(&token).reject_customer(id, &reason).await {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/customers/{id}/suspend",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = ReasonBody,
    responses(
        (status = 200, description = "Customer suspended", body = CustomerRecord),
        (status = 403, description = "Missing the users:suspend permission"),
        (status = 404, description = "No such customer"),
        (status = 422, description = "A suspension reason is required", body = ErrorBody)
    ),
    tag = "customers"
)]
pub async fn suspend(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    state: Extension<Arc<AppState>>,
    body: Option<Json<ReasonBody>>,
) -> impl IntoResponse {
    let Some(token) = extract_session_token(&headers) else {
        return error_response(AuthError::InvalidCredentials);
    };
    let reason = body.and_then(|Json(body)| body.reason).unwrap_or_default();
    match state
        .auth_service(&token)
        .suspend_customer(id, &reason)
        .await
    {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(err) => error_response(err),
    }
}
