use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use vault_core::error::AppError;
use vault_core::observability::{init_tracing, shutdown_tracing};
use vault_service::{
    build_router,
    config::{StoreBackend, VaultConfig},
    db,
    services::{
        metrics::init_metrics, AuthenticityScorer, Database, EmailProvider, HeuristicScorer,
        HttpScorer, JwtService, MemoryStore, MockEmailService, SmtpEmailService, VaultStore,
    },
    utils::Password,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = VaultConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting document vault service"
    );

    let store: Arc<dyn VaultStore> = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database)
                .await
                .map_err(AppError::DatabaseError)?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
            Arc::new(Database::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let email: Arc<dyn EmailProvider> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp)?),
        None => {
            tracing::warn!("SMTP is not configured; reset links are only logged");
            Arc::new(MockEmailService::new())
        }
    };

    let scorer: Arc<dyn AuthenticityScorer> = match &config.scoring.url {
        Some(url) => Arc::new(HttpScorer::new(url)),
        None => {
            tracing::info!("No scorer URL configured; using heuristic authenticity scoring");
            Arc::new(HeuristicScorer)
        }
    };

    let jwt = JwtService::new(&config.jwt)?;

    let bootstrap_admin = config.bootstrap_admin.clone();
    let port = config.common.port;
    let addr: SocketAddr = config.common.bind_address()?;
    let state = AppState::new(config, store, jwt, email, scorer);

    if let Some(admin) = bootstrap_admin {
        let created = state
            .identity
            .ensure_bootstrap_admin(&admin.email, Password::new(admin.password), &admin.telephone)
            .await?;
        if created {
            tracing::info!("Bootstrap gov_admin created");
        }
    }

    let app = build_router(state).await?;

    let service_span = tracing::info_span!("service", port);
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tracing();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
