//! Transfer request decoding
//!
//! Turns the raw `POST /api/transaction` body into a [`TransferCommand`].
//! Only structural checks happen here; balances and row existence are checked
//! by the executor under lock.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use super::error::TransferError;
use super::types::{InventoryMod, ItemId, PlayerId, TransferCommand};

/// One entry of `inventory_mods`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InventoryModRequest {
    #[schema(example = 7)]
    pub item_id: ItemId,
    /// Signed delta applied to the source player's line for `item_id`
    #[schema(example = -3)]
    pub quantity: i64,
}

/// Wire format of a transfer request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransactionRequest {
    #[schema(example = 1)]
    pub from_player_id: PlayerId,
    #[schema(example = 2)]
    pub to_player_id: PlayerId,
    #[schema(value_type = f64, example = 30.0)]
    #[serde(deserialize_with = "deserialize_amount")]
    pub money_amount: Decimal,
    #[serde(default)]
    pub inventory_mods: Vec<InventoryModRequest>,
}

/// Read `money_amount` as a JSON number only, never a string
///
/// The float goes through its shortest decimal form, so `0.1` is exactly
/// `0.1`. Values outside the `Decimal` range are rejected.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Decimal::from_str(&value.to_string())
        .map_err(|_| D::Error::invalid_value(Unexpected::Float(value), &"a decimal amount"))
}

impl TryFrom<TransactionRequest> for TransferCommand {
    type Error = TransferError;

    fn try_from(req: TransactionRequest) -> Result<Self, Self::Error> {
        if req.money_amount < Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        if req.from_player_id == req.to_player_id {
            return Err(TransferError::SameAccount);
        }

        Ok(TransferCommand {
            from_player_id: req.from_player_id,
            to_player_id: req.to_player_id,
            amount: req.money_amount,
            inventory_mods: req
                .inventory_mods
                .into_iter()
                .map(|m| InventoryMod::new(m.item_id, m.quantity))
                .collect(),
        })
    }
}

/// Decode a request body into a validated command
pub fn decode_transfer(body: &[u8]) -> Result<TransferCommand, TransferError> {
    let req: TransactionRequest =
        serde_json::from_slice(body).map_err(|e| TransferError::Decode(e.to_string()))?;
    TransferCommand::try_from(req)
}
