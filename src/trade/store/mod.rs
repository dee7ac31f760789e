//! Trade Store Abstraction
//!
//! The executor talks to storage only through these traits. PostgreSQL is the
//! production backend; [`MemoryStore`] is an in-process backend with the same
//! row-locking semantics, used by tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgTradeStore;

use async_trait::async_trait;

use super::error::TransferError;
use super::types::{ItemId, Money, PlayerId};

/// Factory for transactional scopes
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Get store name for logging
    fn name(&self) -> &'static str;

    /// Open a new transactional scope
    async fn begin(&self) -> Result<Box<dyn TradeTx>, TransferError>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), TransferError>;
}

/// One open unit of work
///
/// Dropping a `TradeTx` without calling [`TradeTx::commit`] discards every
/// write made through it and releases its row locks.
#[async_trait]
pub trait TradeTx: Send {
    /// Read a player's balance, holding an exclusive lock on the row until the
    /// scope ends. `None` if the player does not exist.
    async fn lock_balance(&mut self, player_id: PlayerId) -> Result<Option<Money>, TransferError>;

    /// Add `delta` (may be negative) to a player's balance
    async fn adjust_balance(&mut self, player_id: PlayerId, delta: Money)
    -> Result<(), TransferError>;

    /// Read an inventory quantity under an exclusive row lock. `None` if the
    /// line does not exist.
    async fn lock_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
    ) -> Result<Option<i64>, TransferError>;

    /// Overwrite an inventory quantity
    async fn set_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<(), TransferError>;

    /// Make every write visible atomically
    async fn commit(self: Box<Self>) -> Result<(), TransferError>;

    /// Discard every write
    async fn rollback(self: Box<Self>) -> Result<(), TransferError>;
}
