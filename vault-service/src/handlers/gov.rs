use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use vault_core::error::AppError;

use crate::{
    dtos::gov::{IssueRequest, VerifyRequest, VerifyResponse},
    middleware::SessionUser,
    models::Document,
    utils::ValidatedJson,
    AppState,
};

/// Approve or reject a document pending verification
#[utoipa::path(
    post,
    path = "/gov/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verified document, or a deletion marker on rejection", body = VerifyResponse),
        (status = 400, description = "Rejection without a reason", body = ErrorResponse),
        (status = 403, description = "Outside the officer's scope", body = ErrorResponse),
        (status = 404, description = "Unknown document", body = ErrorResponse),
        (status = 409, description = "Document is not pending verification", body = ErrorResponse)
    ),
    tag = "Government",
    security(("session_cookie" = []))
)]
pub async fn verify(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let outcome = state
        .documents
        .verify(&session, req.document_id, req.decision, req.reason)
        .await?;
    Ok(Json(outcome.into()))
}

/// Issue a document directly into a citizen's vault by national ID
#[utoipa::path(
    post,
    path = "/gov/issue",
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Document issued", body = Document),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Outside the officer's scope", body = ErrorResponse),
        (status = 404, description = "No principal holds this national ID", body = ErrorResponse)
    ),
    tag = "Government",
    security(("session_cookie" = []))
)]
pub async fn issue(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<IssueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.documents.issue(&session, req.into()).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Documents awaiting a verification decision
#[utoipa::path(
    get,
    path = "/gov/documents/pending",
    responses(
        (status = 200, description = "Pending documents", body = [Document]),
        (status = 403, description = "Not a government principal", body = ErrorResponse)
    ),
    tag = "Government",
    security(("session_cookie" = []))
)]
pub async fn pending(
    State(state): State<AppState>,
    SessionUser(_session): SessionUser,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.documents.list_pending().await?))
}
