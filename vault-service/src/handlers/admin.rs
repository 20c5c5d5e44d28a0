use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use vault_core::error::AppError;

use crate::{
    dtos::{
        admin::{
            AuditQuery, CreateOrganizationRequest, CreateUserRequest, ListQuery,
            DEFAULT_PRINCIPAL_LIMIT,
        },
        auth::PrincipalSummary,
        gov::ExpireResponse,
    },
    middleware::SessionUser,
    models::{AuditLogEntry, Organization},
    services::AuditFilter,
    utils::ValidatedJson,
    AppState,
};

/// Move lapsed ISSUED and VERIFIED documents to EXPIRED
#[utoipa::path(
    post,
    path = "/gov/admin/documents/expire",
    responses(
        (status = 200, description = "Number of documents expired", body = ExpireResponse),
        (status = 403, description = "Not a gov_admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn expire_documents(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
) -> Result<Json<ExpireResponse>, AppError> {
    let expired = state.documents.expire_lapsed(&session).await?;
    Ok(Json(ExpireResponse { expired }))
}

/// Query the audit ledger, newest first
#[utoipa::path(
    get,
    path = "/gov/admin/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Matching ledger entries", body = [AuditLogEntry]),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "Not a gov_admin", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn audit(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let filter = AuditFilter::from(query);
    Ok(Json(state.audit.query(&filter).await?))
}

/// Register a government organization
#[utoipa::path(
    post,
    path = "/gov/admin/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Code already in use", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn create_organization(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization = state
        .organizations
        .create(session.sub, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

#[utoipa::path(
    get,
    path = "/gov/admin/organizations",
    responses(
        (status = 200, description = "All organizations", body = [Organization])
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
) -> Result<Json<Vec<Organization>>, AppError> {
    Ok(Json(state.organizations.list().await?))
}

/// Provision a government principal
#[utoipa::path(
    post,
    path = "/gov/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Principal created", body = PrincipalSummary),
        (status = 400, description = "Validation error or non-government role", body = ErrorResponse),
        (status = 404, description = "Unknown organization", body = ErrorResponse),
        (status = 409, description = "Email or telephone already registered", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .identity
        .create_government_principal(Some(session.sub), req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(PrincipalSummary::from(&principal))))
}

#[utoipa::path(
    get,
    path = "/gov/admin/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Principals, newest first", body = [PrincipalSummary])
    ),
    tag = "Admin",
    security(("session_cookie" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PrincipalSummary>>, AppError> {
    let principals = state
        .identity
        .list_principals(query.limit.unwrap_or(DEFAULT_PRINCIPAL_LIMIT))
        .await?;
    Ok(Json(principals.iter().map(PrincipalSummary::from).collect()))
}
