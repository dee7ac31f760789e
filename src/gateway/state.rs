use std::sync::Arc;

use crate::trade::TransferExecutor;

/// Gateway application state (shared)
///
/// Built once at start-up and handed to the router; handlers never reach for
/// globals.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<TransferExecutor>,
}

impl AppState {
    pub fn new(executor: Arc<TransferExecutor>) -> Self {
        Self { executor }
    }
}
