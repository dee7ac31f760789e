//! Trade System - atomic player-to-player transfers
//!
//! An HTTP service that moves money and inventory between two players in a
//! single PostgreSQL transaction.
//!
//! # Modules
//!
//! - [`trade`] - Transfer decoding, execution and storage backends
//! - [`gateway`] - HTTP router, handlers and OpenAPI document
//! - [`db`] - Connection pool and schema bootstrap
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod trade;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use db::Database;
pub use trade::{
    MemoryStore, PgTradeStore, TradeStore, TransferCommand, TransferError, TransferExecutor,
};
