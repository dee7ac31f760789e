//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:3000/docs`
//! - OpenAPI JSON: `http://localhost:3000/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::types::{ErrorResponse, HealthResponse, MessageResponse};
use crate::trade::decode::{InventoryModRequest, TransactionRequest};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade System API",
        version = "1.0.0",
        description = "Atomic money and inventory transfers between players."
    ),
    servers(
        (url = "http://localhost:3000", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::transaction::create_transaction,
    ),
    components(
        schemas(
            TransactionRequest,
            InventoryModRequest,
            MessageResponse,
            ErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "Transaction", description = "Player-to-player transfers"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
