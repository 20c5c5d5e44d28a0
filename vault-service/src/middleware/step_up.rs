use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use vault_core::error::AppError;

use crate::{services::StepUpClaims, AppState};

/// A verified `document_access` token taken from `Authorization: Bearer`.
/// Session cookies are not consulted.
#[derive(Debug, Clone)]
pub struct StepUpUser(pub StepUpClaims);

#[axum::async_trait]
impl FromRequestParts<AppState> for StepUpUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("A step-up token is required"))
            })?;

        let claims = state.jwt.verify_step_up(token).map_err(|e| {
            tracing::debug!(error = %e, "Step-up token rejected");
            AppError::Unauthorized(anyhow::anyhow!("Invalid or expired step-up token"))
        })?;

        Ok(StepUpUser(claims))
    }
}
