//! Transfer Executor
//!
//! Runs one [`TransferCommand`] as a single unit of work.
//!
//! ```text
//! begin                        ┐
//!   lock source balance        │ -> SourceAccountNotFound / InsufficientFunds
//!   debit source               │
//!   for each inventory mod     │ deadline
//!     lock source line         │ -> InventoryNotFound
//!     write current + delta    │ -> InsufficientInventory / QuantityOverflow
//!   lock destination balance   │ -> DestinationAccountNotFound
//!   credit destination         ┘ -> BalanceOverflow
//! commit
//! ```
//!
//! Locks are always taken in this order (source account, inventory lines,
//! destination account) so two transfers over overlapping rows queue on the
//! same first row instead of deadlocking.
//!
//! The deadline stops at the last write. Commit runs to completion, so a
//! `Timeout` always means nothing was committed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::error::TransferError;
use super::store::{TradeStore, TradeTx};
use super::types::{InventoryChange, TransferCommand, TransferReceipt};

/// Executes transfers against a [`TradeStore`]
pub struct TransferExecutor {
    store: Arc<dyn TradeStore>,
    /// Upper bound for begin through the last write, lock waits included
    deadline: Duration,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn TradeStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    pub fn store(&self) -> &Arc<dyn TradeStore> {
        &self.store
    }

    /// Execute a transfer atomically
    ///
    /// On any error nothing is committed. When the deadline expires the
    /// in-flight scope is dropped, which rolls it back.
    pub async fn execute(&self, cmd: &TransferCommand) -> Result<TransferReceipt, TransferError> {
        let outcome = self.run(cmd).await;

        match &outcome {
            Ok(receipt) => info!(
                from = cmd.from_player_id,
                to = cmd.to_player_id,
                amount = %cmd.amount,
                mods = cmd.inventory_mods.len(),
                from_balance = %receipt.from_balance,
                to_balance = %receipt.to_balance,
                "Transfer committed"
            ),
            Err(e) if e.is_client_error() => warn!(
                from = cmd.from_player_id,
                to = cmd.to_player_id,
                amount = %cmd.amount,
                code = e.code(),
                "Transfer rejected: {}",
                e
            ),
            Err(e) => error!(
                from = cmd.from_player_id,
                to = cmd.to_player_id,
                amount = %cmd.amount,
                code = e.code(),
                "Transfer failed: {}",
                e
            ),
        }

        outcome
    }

    async fn run(&self, cmd: &TransferCommand) -> Result<TransferReceipt, TransferError> {
        let (tx, receipt) = tokio::time::timeout(self.deadline, self.stage(cmd))
            .await
            .map_err(|_| TransferError::Timeout)??;

        tx.commit().await?;
        Ok(receipt)
    }

    /// Begin and apply every write; the returned scope is ready to commit
    async fn stage(
        &self,
        cmd: &TransferCommand,
    ) -> Result<(Box<dyn TradeTx>, TransferReceipt), TransferError> {
        let mut tx = self.store.begin().await?;

        match apply(tx.as_mut(), cmd).await {
            Ok(receipt) => Ok((tx, receipt)),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed transfer also failed");
                }
                Err(e)
            }
        }
    }
}

/// All reads, checks and writes of one transfer, in lock order
async fn apply(
    tx: &mut dyn TradeTx,
    cmd: &TransferCommand,
) -> Result<TransferReceipt, TransferError> {
    // 1. Source account
    let from_balance = tx
        .lock_balance(cmd.from_player_id)
        .await?
        .ok_or(TransferError::SourceAccountNotFound)?;

    if from_balance < cmd.amount {
        return Err(TransferError::InsufficientFunds);
    }

    tx.adjust_balance(cmd.from_player_id, -cmd.amount).await?;

    // 2. Source inventory lines, in command order
    let mut inventory = Vec::with_capacity(cmd.inventory_mods.len());
    for m in &cmd.inventory_mods {
        let current = tx
            .lock_quantity(cmd.from_player_id, m.item_id)
            .await?
            .ok_or(TransferError::InventoryNotFound { item_id: m.item_id })?;

        let quantity = current
            .checked_add(m.delta)
            .ok_or(TransferError::QuantityOverflow { item_id: m.item_id })?;
        if quantity < 0 {
            return Err(TransferError::InsufficientInventory { item_id: m.item_id });
        }

        tx.set_quantity(cmd.from_player_id, m.item_id, quantity).await?;
        inventory.push(InventoryChange {
            item_id: m.item_id,
            quantity,
        });
    }

    // 3. Destination account
    let to_balance = tx
        .lock_balance(cmd.to_player_id)
        .await?
        .ok_or(TransferError::DestinationAccountNotFound)?;

    let credited = to_balance
        .checked_add(cmd.amount)
        .ok_or(TransferError::BalanceOverflow)?;

    tx.adjust_balance(cmd.to_player_id, cmd.amount).await?;

    Ok(TransferReceipt {
        from_balance: from_balance - cmd.amount,
        to_balance: credited,
        inventory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::store::MemoryStore;
    use rust_decimal::Decimal;

    fn setup() -> (MemoryStore, TransferExecutor) {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));
        store.insert_player(2, Decimal::from(50));
        store.insert_item(1, 7, 10);
        let executor = TransferExecutor::new(Arc::new(store.clone()), Duration::from_secs(5));
        (store, executor)
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let (store, executor) = setup();
        let cmd = TransferCommand::new(1, 2, Decimal::from(30)).with_mod(7, -3);

        let receipt = executor.execute(&cmd).await.unwrap();

        assert_eq!(receipt.from_balance, Decimal::from(70));
        assert_eq!(receipt.to_balance, Decimal::from(80));
        assert_eq!(
            receipt.inventory,
            vec![InventoryChange {
                item_id: 7,
                quantity: 7
            }]
        );
        assert_eq!(store.balance(1), Some(Decimal::from(70)));
        assert_eq!(store.balance(2), Some(Decimal::from(80)));
        assert_eq!(store.quantity(1, 7), Some(7));
    }

    #[tokio::test]
    async fn test_exact_balance_is_sufficient() {
        let (store, executor) = setup();
        let cmd = TransferCommand::new(1, 2, Decimal::from(100));

        executor.execute(&cmd).await.unwrap();
        assert_eq!(store.balance(1), Some(Decimal::ZERO));
        assert_eq!(store.balance(2), Some(Decimal::from(150)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_rolls_back() {
        let (store, executor) = setup();
        let before = store.snapshot();
        let cmd = TransferCommand::new(1, 2, Decimal::from(150)).with_mod(7, -3);

        let err = executor.execute(&cmd).await.unwrap_err();

        assert_eq!(err, TransferError::InsufficientFunds);
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_inventory_rolls_back_debit() {
        let (store, executor) = setup();
        let before = store.snapshot();
        let cmd = TransferCommand::new(1, 2, Decimal::from(30)).with_mod(7, -15);

        let err = executor.execute(&cmd).await.unwrap_err();

        assert_eq!(err, TransferError::InsufficientInventory { item_id: 7 });
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_quantity_overflow() {
        let (store, executor) = setup();
        store.insert_item(1, 8, i64::MAX);
        let cmd = TransferCommand::new(1, 2, Decimal::ZERO).with_mod(8, 1);

        let err = executor.execute(&cmd).await.unwrap_err();
        assert_eq!(err, TransferError::QuantityOverflow { item_id: 8 });
        assert_eq!(store.quantity(1, 8), Some(i64::MAX));
    }

    #[tokio::test]
    async fn test_balance_overflow_is_rejected_before_credit() {
        let (store, executor) = setup();
        store.insert_player(2, Decimal::MAX);
        let before = store.snapshot();

        let err = executor
            .execute(&TransferCommand::new(1, 2, Decimal::ONE).with_mod(7, -3))
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::BalanceOverflow);
        assert_eq!(err.code(), "BALANCE_OVERFLOW");
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_slow_commit_is_not_cut_by_deadline() {
        let (store, _) = setup();
        let executor = TransferExecutor::new(Arc::new(store.clone()), Duration::from_millis(50));
        store.delay_next_commit(Duration::from_millis(150));

        let receipt = executor
            .execute(&TransferCommand::new(1, 2, Decimal::from(30)))
            .await
            .unwrap();

        assert_eq!(receipt.from_balance, Decimal::from(70));
        assert_eq!(store.balance(1), Some(Decimal::from(70)));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let (store, executor) = setup();
        let before = store.snapshot();

        let err = executor
            .execute(&TransferCommand::new(99, 2, Decimal::ONE))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::SourceAccountNotFound);

        let err = executor
            .execute(&TransferCommand::new(1, 99, Decimal::ONE))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::DestinationAccountNotFound);

        let err = executor
            .execute(&TransferCommand::new(1, 2, Decimal::ONE).with_mod(404, 1))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InventoryNotFound { item_id: 404 });

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.row_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_state_untouched() {
        let (store, executor) = setup();
        let before = store.snapshot();
        store.fail_next_commit();

        let err = executor
            .execute(&TransferCommand::new(1, 2, Decimal::from(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::TransactionFailure { .. }));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_begin_failure() {
        let (store, executor) = setup();
        store.fail_next_begin();

        let err = executor
            .execute(&TransferCommand::new(1, 2, Decimal::from(30)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TRANSACTION_FAILURE");
    }

    #[tokio::test]
    async fn test_duplicate_item_mods_apply_sequentially() {
        let (store, executor) = setup();
        let cmd = TransferCommand::new(1, 2, Decimal::ZERO)
            .with_mod(7, -4)
            .with_mod(7, -4);

        let receipt = executor.execute(&cmd).await.unwrap();
        assert_eq!(receipt.inventory[1].quantity, 2);
        assert_eq!(store.quantity(1, 7), Some(2));

        // Running it again would go negative on the first mod
        let err = executor.execute(&cmd).await.unwrap_err();
        assert_eq!(err, TransferError::InsufficientInventory { item_id: 7 });
        assert_eq!(store.quantity(1, 7), Some(2));
    }
}
