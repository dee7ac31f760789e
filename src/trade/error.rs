//! Transfer Error Types
//!
//! Every failure of a transfer request is one of these variants. Each maps to
//! a stable error code and an HTTP status.

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use super::types::ItemId;

/// Step of the unit of work at which a storage error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Query,
    Update,
    Commit,
    Rollback,
}

impl TxStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStage::Begin => "begin",
            TxStage::Query => "query",
            TxStage::Update => "update",
            TxStage::Commit => "commit",
            TxStage::Rollback => "rollback",
        }
    }
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    // === Decode / Validation Errors ===
    #[error("Invalid request format: {0}")]
    Decode(String),

    #[error("Amount must not be negative")]
    InvalidAmount,

    #[error("Source and destination player cannot be the same")]
    SameAccount,

    // === Not Found ===
    #[error("Source player not found")]
    SourceAccountNotFound,

    #[error("Destination player not found")]
    DestinationAccountNotFound,

    #[error("Inventory not found for item {item_id}")]
    InventoryNotFound { item_id: ItemId },

    // === Business Rules ===
    #[error("Insufficient funds on source player balance")]
    InsufficientFunds,

    #[error("Insufficient quantity of item {item_id}")]
    InsufficientInventory { item_id: ItemId },

    #[error("Quantity of item {item_id} would overflow")]
    QuantityOverflow { item_id: ItemId },

    #[error("Destination player balance would overflow")]
    BalanceOverflow,

    // === System Errors ===
    #[error("Transaction deadline exceeded")]
    Timeout,

    #[error("Transaction failed during {stage}: {detail}")]
    TransactionFailure { stage: TxStage, detail: String },
}

impl TransferError {
    /// Storage failure at the given stage
    pub fn storage(stage: TxStage, detail: impl Into<String>) -> Self {
        TransferError::TransactionFailure {
            stage,
            detail: detail.into(),
        }
    }

    /// Get the error code for logs and API consumers
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Decode(_) => "INVALID_REQUEST",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::SourceAccountNotFound => "SOURCE_ACCOUNT_NOT_FOUND",
            TransferError::DestinationAccountNotFound => "DESTINATION_ACCOUNT_NOT_FOUND",
            TransferError::InventoryNotFound { .. } => "INVENTORY_NOT_FOUND",
            TransferError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransferError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            TransferError::QuantityOverflow { .. } => "QUANTITY_OVERFLOW",
            TransferError::BalanceOverflow => "BALANCE_OVERFLOW",
            TransferError::Timeout => "TIMEOUT",
            TransferError::TransactionFailure { .. } => "TRANSACTION_FAILURE",
        }
    }

    /// Get HTTP status code
    pub fn http_status(&self) -> StatusCode {
        match self {
            TransferError::Decode(_)
            | TransferError::InvalidAmount
            | TransferError::SameAccount
            | TransferError::InsufficientFunds
            | TransferError::InsufficientInventory { .. }
            | TransferError::QuantityOverflow { .. }
            | TransferError::BalanceOverflow => StatusCode::BAD_REQUEST,
            TransferError::SourceAccountNotFound
            | TransferError::DestinationAccountNotFound
            | TransferError::InventoryNotFound { .. } => StatusCode::NOT_FOUND,
            TransferError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            TransferError::TransactionFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller
    ///
    /// Driver detail of storage failures stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::TransactionFailure { stage, .. } => match stage {
                TxStage::Begin => "Failed to begin transaction",
                TxStage::Query => "Failed to read player or inventory state",
                TxStage::Update => "Failed to update player or inventory state",
                TxStage::Commit => "Failed to commit transaction",
                TxStage::Rollback => "Failed to roll back transaction",
            }
            .to_string(),
            other => other.to_string(),
        }
    }

    /// True for rejections caused by the request itself (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }
}
