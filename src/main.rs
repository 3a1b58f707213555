use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, middleware as axum_middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod metrics;
mod models;
mod services;
mod utils;

use crate::config::AppConfig;
use crate::db::{Database, LedgerStore};
use crate::services::affiliate::AffiliateService;
use crate::services::commission::CommissionService;
use crate::services::withdrawal::WithdrawalService;

pub struct AppState {
    pub config: AppConfig,
    pub ledger: LedgerStore,
    pub affiliate_service: Arc<AffiliateService>,
    pub commission_service: Arc<CommissionService>,
    pub withdrawal_service: Arc<WithdrawalService>,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsafe_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting DocSafe Affiliate Backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    // Initialize Prometheus exporter
    let metrics_handle = metrics::init_metrics();

    // Initialize database
    let db = Database::connect(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connected");

    db.run_migrations().await?;
    tracing::info!("Migrations applied");

    // One ledger handle, shared by every service
    let ledger = LedgerStore::new(db.pool.clone());

    let affiliate_service = Arc::new(AffiliateService::new(ledger.clone()));
    let commission_service = Arc::new(CommissionService::new(ledger.clone()));
    let withdrawal_service = Arc::new(WithdrawalService::new(ledger.clone()));
    tracing::info!("Affiliate program services initialized");

    // Start the periodic commission batch (idempotent per referred user and month)
    commission_service
        .clone()
        .start_batch_loop(config.commission_batch_interval_secs)
        .await;
    tracing::info!(
        "Commission batch loop started (every {}s)",
        config.commission_batch_interval_secs
    );

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        ledger,
        affiliate_service,
        commission_service,
        withdrawal_service,
        metrics_handle,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .layer(axum_middleware::from_fn(api::middleware::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
