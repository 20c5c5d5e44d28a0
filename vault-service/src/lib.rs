pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;
use vault_core::error::AppError;
use vault_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, metrics_middleware, request_id_middleware,
    security_headers_middleware, IpRateLimiter, REQUEST_ID_HEADER,
};

use crate::config::{SwaggerMode, VaultConfig};
use crate::models::Role;
use crate::services::{
    Access, AuditLedger, AuthenticityScorer, DocumentService, EmailProvider, IdentityService,
    JwtService, OrganizationService, RbacPolicy, ServiceError, StepUpService, VaultStore,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::register,
        handlers::auth::request_reset,
        handlers::auth::reset_validate,
        handlers::auth::reset_password,
        handlers::auth::step_up,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::documents::upload,
        handlers::documents::request,
        handlers::documents::list,
        handlers::documents::view,
        handlers::gov::verify,
        handlers::gov::issue,
        handlers::gov::pending,
        handlers::admin::expire_documents,
        handlers::admin::audit,
        handlers::admin::create_organization,
        handlers::admin::list_organizations,
        handlers::admin::create_user,
        handlers::admin::list_users,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::PrincipalSummary,
            dtos::auth::RequestResetRequest,
            dtos::auth::ResetValidateRequest,
            dtos::auth::ResetValidateResponse,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::StepUpRequest,
            dtos::auth::StepUpResponse,
            dtos::documents::UploadDocumentRequest,
            dtos::documents::RequestDocumentRequest,
            dtos::documents::ViewResponse,
            dtos::gov::VerifyRequest,
            dtos::gov::VerifyResponse,
            dtos::gov::RejectedResponse,
            dtos::gov::IssueRequest,
            dtos::gov::ExpireResponse,
            dtos::admin::CreateOrganizationRequest,
            dtos::admin::CreateUserRequest,
            models::Role,
            models::Document,
            models::DocumentStatus,
            models::DocumentMetadata,
            models::GovAudit,
            models::Decision,
            models::Organization,
            models::AuditLogEntry,
            models::AuditAction,
            models::TargetKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Sessions, registration, password reset and step-up"),
        (name = "Documents", description = "Citizen vault operations"),
        (name = "Government", description = "Verification and issuance"),
        (name = "Admin", description = "Oversight, organizations and government users"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    middleware::SESSION_COOKIE,
                ))),
            );
            components.add_security_scheme(
                "step_up_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VaultConfig>,
    pub store: Arc<dyn VaultStore>,
    pub jwt: Arc<JwtService>,
    pub identity: IdentityService,
    pub step_up: StepUpService,
    pub documents: DocumentService,
    pub organizations: OrganizationService,
    pub audit: AuditLedger,
    pub rbac: Arc<RbacPolicy>,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub step_up_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: VaultConfig,
        store: Arc<dyn VaultStore>,
        jwt: JwtService,
        email: Arc<dyn EmailProvider>,
        scorer: Arc<dyn AuthenticityScorer>,
    ) -> Self {
        let jwt = Arc::new(jwt);
        let limits = &config.rate_limit;

        let limiter = |attempts, window_seconds| {
            create_ip_rate_limiter(attempts, window_seconds)
                .with_trusted_proxy_hops(limits.trusted_proxy_hops)
        };
        let login_rate_limiter = limiter(limits.login_attempts, limits.login_window_seconds);
        let register_rate_limiter =
            limiter(limits.register_attempts, limits.register_window_seconds);
        let password_reset_rate_limiter = limiter(
            limits.password_reset_attempts,
            limits.password_reset_window_seconds,
        );
        let step_up_rate_limiter = limiter(limits.step_up_attempts, limits.step_up_window_seconds);
        let ip_rate_limiter = limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        let identity = IdentityService::new(
            store.clone(),
            jwt.clone(),
            email,
            config.reset.token_expiry_minutes,
            &config.reset.public_base_url,
        );
        let step_up = StepUpService::new(store.clone(), jwt.clone());
        let audit = AuditLedger::new(store.clone());
        let documents = DocumentService::new(
            store.clone(),
            audit.clone(),
            scorer,
            Duration::from_millis(config.scoring.timeout_ms),
        );
        let organizations = OrganizationService::new(store.clone());
        let rbac = Arc::new(RbacPolicy::standard(docs_access(&config.swagger.enabled)));

        Self {
            config: Arc::new(config),
            store,
            jwt,
            identity,
            step_up,
            documents,
            organizations,
            audit,
            rbac,
            login_rate_limiter,
            register_rate_limiter,
            password_reset_rate_limiter,
            step_up_rate_limiter,
            ip_rate_limiter,
        }
    }
}

/// Who may read the OpenAPI document and Swagger UI.
pub fn docs_access(mode: &SwaggerMode) -> Access {
    match mode {
        SwaggerMode::Public => Access::Public,
        SwaggerMode::Authenticated | SwaggerMode::Disabled => Access::Roles(&[Role::GovAdmin]),
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let reset_request_route = Router::new()
        .route("/auth/request-reset", post(handlers::auth::request_reset))
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let step_up_route = Router::new()
        .route("/auth/step-up", post(handlers::auth::step_up))
        .layer(from_fn_with_state(
            state.step_up_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.swagger.enabled == SwaggerMode::Disabled {
        // The document stays available for tooling; only the UI is dropped.
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    } else {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    }

    let cors = cors_layer(&state.config.security.allowed_origins)?;
    let request_timeout = Duration::from_secs(state.config.common.request_timeout_seconds);
    let body_limit = state.config.documents.max_body_bytes;

    let app = app
        .route("/auth/reset-validate", post(handlers::auth::reset_validate))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/me", get(handlers::auth::me))
        .route("/documents", get(handlers::documents::list))
        .route("/documents/upload", post(handlers::documents::upload))
        .route("/documents/request", post(handlers::documents::request))
        .route("/documents/:id/view", get(handlers::documents::view))
        .route("/gov/verify", post(handlers::gov::verify))
        .route("/gov/issue", post(handlers::gov::issue))
        .route("/gov/documents/pending", get(handlers::gov::pending))
        .route(
            "/gov/admin/documents/expire",
            post(handlers::admin::expire_documents),
        )
        .route("/gov/admin/audit", get(handlers::admin::audit))
        .route(
            "/gov/admin/organizations",
            post(handlers::admin::create_organization).get(handlers::admin::list_organizations),
        )
        .route(
            "/gov/admin/users",
            post(handlers::admin::create_user).get(handlers::admin::list_users),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(reset_request_route)
        .merge(step_up_route)
        .fallback(not_found)
        // Evaluated for every route and the fallback, so unknown paths are denied.
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rbac_middleware,
        ))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors);

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(REQUEST_ID_HEADER),
        ]))
}

async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Resource not found"))
}

/// Liveness and store reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(ServiceError::from(e))
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
