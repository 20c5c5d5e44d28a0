use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use vault_core::error::AppError;

use crate::{
    dtos::{
        auth::{
            LoginRequest, LoginResponse, PrincipalSummary, RegisterRequest, RequestResetRequest,
            ResetPasswordRequest, ResetValidateRequest, ResetValidateResponse, StepUpRequest,
            StepUpResponse,
        },
        MessageResponse,
    },
    middleware::{cleared_session_cookie, session_cookie, SessionUser},
    services::ServiceError,
    utils::{Password, ValidatedJson},
    AppState,
};

pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account matches, a password reset link has been sent";

/// Login with email, telephone or national ID
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; session cookie set", body = LoginResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let outcome = state
        .identity
        .login(&req.identifier, &Password::new(req.password))
        .await?;

    let cookie = session_cookie(
        outcome.session.token,
        outcome.session.expires_in,
        state.config.session.cookie_secure,
    );

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            principal: PrincipalSummary::from(&outcome.principal),
            expires_in: outcome.session.expires_in,
            redirect_to: outcome.principal.role.landing_page().to_string(),
        }),
    ))
}

/// Register a citizen account, optionally linked to a national ID
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account and vault created", body = PrincipalSummary),
        (status = 400, description = "Validation error or registry mismatch", body = ErrorResponse),
        (status = 404, description = "National ID not found in registry", body = ErrorResponse),
        (status = 409, description = "Email, telephone or national ID already registered", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.identity.register(req.into()).await?;
    Ok((StatusCode::CREATED, Json(PrincipalSummary::from(&principal))))
}

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/request-reset",
    request_body = RequestResetRequest,
    responses(
        (status = 200, description = "Uniform acknowledgement", body = MessageResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RequestResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.request_reset(&req.identifier).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_REQUESTED_MESSAGE))))
}

/// Check a password reset token without consuming it
#[utoipa::path(
    post,
    path = "/auth/reset-validate",
    request_body = ResetValidateRequest,
    responses(
        (status = 200, description = "Token is valid", body = ResetValidateResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_validate(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.validate_reset(&req.token).await?;
    Ok(Json(ResetValidateResponse { valid: true }))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .identity
        .complete_reset(&req.token, &Password::new(req.new_password))
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

/// Re-enter the password to obtain a short-lived document access token
#[utoipa::path(
    post,
    path = "/auth/step-up",
    request_body = StepUpRequest,
    responses(
        (status = 200, description = "Step-up token issued", body = StepUpResponse),
        (status = 401, description = "No session or wrong password", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
pub async fn step_up(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    ValidatedJson(req): ValidatedJson<StepUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state
        .step_up
        .step_up(session.sub, &Password::new(req.password))
        .await?;

    Ok(Json(StepUpResponse {
        token: issued.token,
        expires_in: issued.expires_in,
    }))
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "No session", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    SessionUser(session): SessionUser,
) -> (CookieJar, Json<MessageResponse>) {
    tracing::info!(user_id = %session.sub, "Logged out");
    (
        jar.add(cleared_session_cookie(state.config.session.cookie_secure)),
        Json(MessageResponse::new("Logged out")),
    )
}

/// The authenticated principal
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current principal", body = PrincipalSummary),
        (status = 401, description = "No session", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
) -> Result<Json<PrincipalSummary>, AppError> {
    let principal = state
        .identity
        .find_principal(session.sub)
        .await
        .map_err(|e| match e {
            // A valid token for a principal that no longer exists.
            ServiceError::NotFound(_) => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            }
            other => other.into(),
        })?;

    Ok(Json(PrincipalSummary::from(&principal)))
}
