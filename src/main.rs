use axum::{
    routing::{get, post},
    Router,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leads_sync_api::config::Config;
use leads_sync_api::db::{LeadsDb, SourceDb};
use leads_sync_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// Initializes logging, configuration, both database pools (leads + read-only
/// guiaseller source), runs pending leads-database migrations, and starts the
/// Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leads_sync_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Leads database: full read/write, migrated at startup
    let leads_db = LeadsDb::connect(&config.leads_database_url).await?;
    sqlx::migrate!("./migrations").run(&leads_db.pool).await?;
    tracing::info!("Leads database connection pool established");

    // Guiaseller source database: read-only at the session level
    let source_db = SourceDb::connect(&config.source_database_url).await?;
    tracing::info!("Source database connection pool established (read-only)");

    let app_state = Arc::new(AppState {
        db: leads_db.pool.clone(),
        source: source_db,
        sync_running: AtomicBool::new(false),
    });

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/leads", get(handlers::list_leads).post(handlers::create_lead))
        .route(
            "/api/v1/leads/:id",
            get(handlers::get_lead)
                .patch(handlers::update_lead)
                .delete(handlers::archive_lead),
        )
        .route("/api/v1/leads/:id/score", post(handlers::recompute_score))
        .route("/api/v1/leads/:id/segment", post(handlers::recompute_segment))
        .route("/api/v1/leads/bulk", post(handlers::bulk_action))
        .route("/api/v1/admin/sync", post(handlers::run_sync))
        .route("/api/v1/admin/sync/status", get(handlers::sync_status))
        .route("/api/v1/analytics/overview", get(handlers::analytics_overview))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MB
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
