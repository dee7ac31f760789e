//! Trade System - HTTP entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ PgPool   │───▶│ Executor │───▶│ Gateway  │
//! │  (YAML)  │    │ (sqlx)   │    │ (locks)  │    │ (axum)   │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;

use trade_system::config::AppConfig;
use trade_system::db::{Database, schema};
use trade_system::gateway::{self, state::AppState};
use trade_system::trade::{PgTradeStore, TransferExecutor};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = trade_system::logging::init_logging(&app_config)?;

    tracing::info!("Starting Trade System in {} mode", env);

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(serve(app_config))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if config.database.ensure_schema {
        schema::ensure_schema(db.pool())
            .await
            .context("Failed to create schema")?;
    }

    let store = PgTradeStore::new(db.pool().clone(), config.transfer.lock_timeout());
    let executor = TransferExecutor::new(Arc::new(store), config.transfer.deadline());
    tracing::info!(
        deadline_ms = config.transfer.deadline_ms,
        lock_timeout_ms = config.transfer.lock_timeout_ms,
        "Transfer executor ready"
    );

    let state = Arc::new(AppState::new(Arc::new(executor)));
    let result = gateway::run_server(&config.gateway, state).await;

    db.close().await;
    result
}
