//! Transfer Core Types
//!
//! Type definitions shared by the decoder, the executor and the stores.

use rust_decimal::Decimal;

/// Player identifier (`players.player_id`, BIGINT)
pub type PlayerId = i64;

/// Item identifier (`inventory.item_id`, BIGINT)
pub type ItemId = i64;

/// Money amount. Stored as NUMERIC.
pub type Money = Decimal;

/// A single signed change to one of the source player's inventory lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryMod {
    pub item_id: ItemId,
    /// Negative removes items, positive adds them
    pub delta: i64,
}

impl InventoryMod {
    pub fn new(item_id: ItemId, delta: i64) -> Self {
        Self { item_id, delta }
    }
}

/// Validated transfer command
///
/// Lives for one request only. Inventory modifications are applied in the
/// order they appear in `inventory_mods`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCommand {
    pub from_player_id: PlayerId,
    pub to_player_id: PlayerId,
    pub amount: Money,
    pub inventory_mods: Vec<InventoryMod>,
}

impl TransferCommand {
    pub fn new(from_player_id: PlayerId, to_player_id: PlayerId, amount: Money) -> Self {
        Self {
            from_player_id,
            to_player_id,
            amount,
            inventory_mods: Vec::new(),
        }
    }

    /// Builder-style helper to append an inventory modification
    pub fn with_mod(mut self, item_id: ItemId, delta: i64) -> Self {
        self.inventory_mods.push(InventoryMod::new(item_id, delta));
        self
    }
}

/// Resulting quantity of one inventory line after a committed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryChange {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// Outcome of a committed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub from_balance: Money,
    pub to_balance: Money,
    /// One entry per applied modification, in command order
    pub inventory: Vec<InventoryChange>,
}
