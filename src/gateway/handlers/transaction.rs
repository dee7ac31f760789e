//! Player-to-player transaction handler

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};

use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, MessageResponse, TRANSFER_OK_MESSAGE};
use crate::trade::decode_transfer;

/// Transfer money and inventory between two players
///
/// POST /api/transaction
///
/// The body is decoded by hand so that malformed JSON gets the same
/// `{"error": ...}` shape as every other failure.
#[utoipa::path(
    post,
    path = "/api/transaction",
    request_body(content = crate::trade::TransactionRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Transfer committed", body = MessageResponse),
        (status = 400, description = "Malformed body, insufficient funds or insufficient inventory", body = crate::gateway::types::ErrorResponse),
        (status = 404, description = "Player or inventory line not found", body = crate::gateway::types::ErrorResponse),
        (status = 500, description = "Storage failure", body = crate::gateway::types::ErrorResponse),
        (status = 504, description = "Transfer deadline exceeded", body = crate::gateway::types::ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let cmd = decode_transfer(&body).inspect_err(|e| {
        tracing::warn!(code = e.code(), "Rejected transaction request: {}", e);
    })?;

    state.executor.execute(&cmd).await?;

    Ok(Json(MessageResponse::new(TRANSFER_OK_MESSAGE)))
}
