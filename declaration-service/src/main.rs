use declaration_service::{
    build_router,
    config::ServiceConfig,
    db,
    services::{
        AccessRightStore, AccessService, Database, DeclarationDirectory, EmailService,
        IdentityDirectory,
    },
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = ServiceConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting declaration service"
    );

    // Initialize database connection
    tracing::info!("Initializing database connection");
    let pool = db::create_pool(&config.database).await.map_err(|e| {
        service_core::error::AppError::DatabaseError(anyhow::anyhow!(
            "Failed to connect to PostgreSQL: {}",
            e
        ))
    })?;

    db::run_migrations(&pool).await.map_err(|e| {
        service_core::error::AppError::DatabaseError(anyhow::anyhow!(
            "Failed to run migrations: {}",
            e
        ))
    })?;
    tracing::info!("Database initialized successfully");

    // Initialize email service
    let email = Arc::new(EmailService::new(&config.smtp)?);
    tracing::info!("Email service initialized");

    // Wire the store and directory seams to PostgreSQL
    let database = Database::new(pool);
    let store: Arc<dyn AccessRightStore> = Arc::new(database.clone());
    let identities: Arc<dyn IdentityDirectory> = Arc::new(database.clone());
    let declarations: Arc<dyn DeclarationDirectory> = Arc::new(database);

    let access = AccessService::new(
        store.clone(),
        identities,
        declarations,
        email,
        config.invite.base_url.clone(),
    );

    // Create application state
    let state = AppState {
        config: config.clone(),
        store,
        access,
    };

    // Build application router
    let app = build_router(state).await?;

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
