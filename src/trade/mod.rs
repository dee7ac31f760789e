//! Player Trade Module
//!
//! Atomic transfer of money and inventory between two players.
//!
//! ```text
//! body bytes ──decode_transfer──▶ TransferCommand ──TransferExecutor──▶ TradeStore
//!                                                                      ├─ PgTradeStore
//!                                                                      └─ MemoryStore
//! ```

pub mod decode;
pub mod error;
pub mod executor;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use decode::{TransactionRequest, decode_transfer};
pub use error::{TransferError, TxStage};
pub use executor::TransferExecutor;
pub use store::{MemoryStore, PgTradeStore, TradeStore, TradeTx};
pub use types::{
    InventoryChange, InventoryMod, ItemId, Money, PlayerId, TransferCommand, TransferReceipt,
};
