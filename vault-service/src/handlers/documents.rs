use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use vault_core::error::AppError;

use crate::{
    dtos::documents::{RequestDocumentRequest, UploadDocumentRequest, ViewResponse},
    middleware::{SessionUser, StepUpUser},
    models::Document,
    utils::ValidatedJson,
    AppState,
};

/// Upload a document into the caller's vault for verification
#[utoipa::path(
    post,
    path = "/documents/upload",
    request_body = UploadDocumentRequest,
    responses(
        (status = 201, description = "Document pending verification", body = Document),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Not a citizen", body = ErrorResponse)
    ),
    tag = "Documents",
    security(("session_cookie" = []))
)]
pub async fn upload(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<UploadDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.documents.upload(&session, req.into()).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Ask for a document to be issued into the caller's vault
#[utoipa::path(
    post,
    path = "/documents/request",
    request_body = RequestDocumentRequest,
    responses(
        (status = 201, description = "Request recorded", body = Document),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "No session", body = ErrorResponse),
        (status = 403, description = "Not a citizen", body = ErrorResponse)
    ),
    tag = "Documents",
    security(("session_cookie" = []))
)]
pub async fn request(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<RequestDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.documents.request(&session, req.into()).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Documents in the caller's vault, newest first
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Documents owned by the caller", body = [Document]),
        (status = 401, description = "No session", body = ErrorResponse)
    ),
    tag = "Documents",
    security(("session_cookie" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.documents.list_own(&session).await?))
}

/// Raw-content locator. Requires a step-up token, not a session.
#[utoipa::path(
    get,
    path = "/documents/{id}/view",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Access granted", body = ViewResponse),
        (status = 401, description = "Missing or invalid step-up token", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No content to view", body = ErrorResponse)
    ),
    tag = "Documents",
    security(("step_up_token" = []))
)]
pub async fn view(
    State(state): State<AppState>,
    StepUpUser(grant): StepUpUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewResponse>, AppError> {
    let grant = state.documents.view(&grant, id).await?;
    Ok(Json(grant.into()))
}
