pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the gateway router
///
/// ```text
/// POST /api/transaction         -> create_transaction
/// GET  /api/health              -> health_check
/// GET  /docs                    -> Swagger UI
/// GET  /api-docs/openapi.json   -> OpenAPI document
/// ```
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/transaction", post(handlers::create_transaction))
        .route("/api/health", get(handlers::health_check))
        .with_state(state)
        // Swagger UI is stateless, merged after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
///
/// Serves until ctrl-c, then drains in-flight requests before returning.
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| {
        format!(
            "Failed to bind to {} (port {} may already be in use)",
            addr, config.port
        )
    })?;

    tracing::info!("🚀 Gateway listening on http://{}", addr);
    tracing::info!("📖 API Docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        // Without a signal handler, keep serving
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
