use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use vault_core::error::AppError;

use super::auth::session_claims;
use crate::{services::RbacDecision, AppState};

pub const LOGIN_PAGE: &str = "/login";

fn wants_html(req: &Request) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Route-level gate. Browsers are redirected; API callers get 401/403.
pub async fn rbac_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let claims = session_claims(&state, req.headers());
    let path = req.uri().path().to_string();

    match state.rbac.authorize(&path, claims.as_ref()) {
        RbacDecision::Allow => next.run(req).await,
        RbacDecision::Unauthenticated => {
            tracing::debug!(path = %path, "Unauthenticated request denied");
            if wants_html(&req) {
                Redirect::to(LOGIN_PAGE).into_response()
            } else {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required")).into_response()
            }
        }
        RbacDecision::Forbidden => {
            let role = claims.map(|c| c.role);
            tracing::info!(path = %path, role = ?role, "Request denied by role");
            match role {
                Some(role) if wants_html(&req) => Redirect::to(role.landing_page()).into_response(),
                _ => AppError::Forbidden(anyhow::anyhow!("Insufficient role for this resource"))
                    .into_response(),
            }
        }
    }
}
