//! In-memory Trade Store
//!
//! Same contract as the PostgreSQL store: one exclusive lock per player row
//! and per inventory line, writes staged inside the transaction and applied
//! atomically on commit, everything discarded on drop.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use super::{TradeStore, TradeTx};
use crate::trade::error::{TransferError, TxStage};
use crate::trade::types::{ItemId, Money, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Player(PlayerId),
    Inventory(PlayerId, ItemId),
}

/// Committed contents of the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub balances: BTreeMap<PlayerId, Money>,
    pub inventory: BTreeMap<(PlayerId, ItemId), i64>,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<StoreSnapshot>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    fail_next_begin: AtomicBool,
    fail_next_commit: AtomicBool,
    commit_delay: Mutex<Option<Duration>>,
    commit_count: AtomicUsize,
    rollback_count: AtomicUsize,
}

/// Lock, ignoring poison
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn row_lock(&self, key: RowKey) -> Arc<RowMutex<()>> {
        lock(&self.row_locks).entry(key).or_default().clone()
    }

    /// Forget row locks nobody holds or waits on
    fn release(&self, keys: impl IntoIterator<Item = RowKey>) {
        let mut row_locks = lock(&self.row_locks);
        for key in keys {
            if row_locks
                .get(&key)
                .is_some_and(|row| Arc::strong_count(row) == 1)
            {
                row_locks.remove(&key);
            }
        }
    }
}

/// In-memory store with row-level locking
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a player row
    pub fn insert_player(&self, player_id: PlayerId, balance: Money) {
        lock(&self.shared.tables).balances.insert(player_id, balance);
    }

    /// Create or overwrite an inventory line
    pub fn insert_item(&self, player_id: PlayerId, item_id: ItemId, quantity: i64) {
        lock(&self.shared.tables)
            .inventory
            .insert((player_id, item_id), quantity);
    }

    /// Committed balance of a player
    pub fn balance(&self, player_id: PlayerId) -> Option<Money> {
        lock(&self.shared.tables).balances.get(&player_id).copied()
    }

    /// Committed quantity of an inventory line
    pub fn quantity(&self, player_id: PlayerId, item_id: ItemId) -> Option<i64> {
        lock(&self.shared.tables)
            .inventory
            .get(&(player_id, item_id))
            .copied()
    }

    /// Copy of all committed rows
    pub fn snapshot(&self) -> StoreSnapshot {
        lock(&self.shared.tables).clone()
    }

    /// Make the next `begin` fail with a storage error
    pub fn fail_next_begin(&self) {
        self.shared.fail_next_begin.store(true, Ordering::SeqCst);
    }

    /// Make the next `commit` fail with a storage error (its writes are discarded)
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make the next `commit` sleep before applying its writes
    pub fn delay_next_commit(&self, delay: Duration) {
        *lock(&self.shared.commit_delay) = Some(delay);
    }

    /// Row locks currently tracked (held or waited on)
    pub fn row_lock_count(&self) -> usize {
        lock(&self.shared.row_locks).len()
    }

    pub fn commit_count(&self) -> usize {
        self.shared.commit_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.shared.rollback_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn TradeTx>, TransferError> {
        if self.shared.fail_next_begin.swap(false, Ordering::SeqCst) {
            return Err(TransferError::storage(
                TxStage::Begin,
                "injected begin failure",
            ));
        }
        Ok(Box::new(MemoryTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            balances: HashMap::new(),
            inventory: HashMap::new(),
        }))
    }

    async fn ping(&self) -> Result<(), TransferError> {
        Ok(())
    }
}

/// Open in-memory transaction
pub struct MemoryTx {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    balances: HashMap<PlayerId, Money>,
    inventory: HashMap<(PlayerId, ItemId), i64>,
}

impl MemoryTx {
    async fn acquire(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let row = self.shared.row_lock(key);
        let guard = row.lock_owned().await;
        self.held.insert(key, guard);
    }

    fn current_balance(&self, player_id: PlayerId) -> Option<Money> {
        self.balances
            .get(&player_id)
            .copied()
            .or_else(|| lock(&self.shared.tables).balances.get(&player_id).copied())
    }

    fn current_quantity(&self, player_id: PlayerId, item_id: ItemId) -> Option<i64> {
        let key = (player_id, item_id);
        self.inventory
            .get(&key)
            .copied()
            .or_else(|| lock(&self.shared.tables).inventory.get(&key).copied())
    }
}

#[async_trait]
impl TradeTx for MemoryTx {
    async fn lock_balance(&mut self, player_id: PlayerId) -> Result<Option<Money>, TransferError> {
        self.acquire(RowKey::Player(player_id)).await;
        Ok(self.current_balance(player_id))
    }

    async fn adjust_balance(
        &mut self,
        player_id: PlayerId,
        delta: Money,
    ) -> Result<(), TransferError> {
        self.acquire(RowKey::Player(player_id)).await;
        let current = self.current_balance(player_id).ok_or_else(|| {
            TransferError::storage(
                TxStage::Update,
                format!("player {} does not exist", player_id),
            )
        })?;
        let updated = current.checked_add(delta).ok_or_else(|| {
            TransferError::storage(
                TxStage::Update,
                format!("balance of player {} out of range", player_id),
            )
        })?;
        self.balances.insert(player_id, updated);
        Ok(())
    }

    async fn lock_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
    ) -> Result<Option<i64>, TransferError> {
        self.acquire(RowKey::Inventory(player_id, item_id)).await;
        Ok(self.current_quantity(player_id, item_id))
    }

    async fn set_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<(), TransferError> {
        self.acquire(RowKey::Inventory(player_id, item_id)).await;
        if self.current_quantity(player_id, item_id).is_none() {
            return Err(TransferError::storage(
                TxStage::Update,
                format!("inventory line {}/{} does not exist", player_id, item_id),
            ));
        }
        self.inventory.insert((player_id, item_id), quantity);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), TransferError> {
        if self.shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.shared.rollback_count.fetch_add(1, Ordering::SeqCst);
            return Err(TransferError::storage(
                TxStage::Commit,
                "injected commit failure",
            ));
        }

        let delay = lock(&self.shared.commit_delay).take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut tables = lock(&self.shared.tables);
            tables.balances.extend(self.balances.iter());
            tables.inventory.extend(self.inventory.iter());
        }
        self.shared.commit_count.fetch_add(1, Ordering::SeqCst);
        // Row locks are released when `self` drops, after the writes are visible
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), TransferError> {
        self.shared.rollback_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();
        self.shared.release(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));

        let mut tx = store.begin().await.unwrap();
        tx.lock_balance(1).await.unwrap();
        tx.adjust_balance(1, Decimal::from(-40)).await.unwrap();
        assert_eq!(tx.lock_balance(1).await.unwrap(), Some(Decimal::from(60)));
        assert_eq!(store.balance(1), Some(Decimal::from(100)));

        tx.commit().await.unwrap();
        assert_eq!(store.balance(1), Some(Decimal::from(60)));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));
        store.insert_item(1, 7, 10);
        let before = store.snapshot();

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_balance(1).await.unwrap();
            tx.adjust_balance(1, Decimal::from(-40)).await.unwrap();
            tx.lock_quantity(1, 7).await.unwrap();
            tx.set_quantity(1, 7, 3).await.unwrap();
        }

        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_missing_rows_are_none() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_balance(42).await.unwrap(), None);
        assert_eq!(tx.lock_quantity(42, 7).await.unwrap(), None);
        assert!(tx.set_quantity(42, 7, 1).await.is_err());

        drop(tx);
        assert_eq!(store.row_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_row_locks_released_after_commit() {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));

        for player in 1..=50 {
            let mut tx = store.begin().await.unwrap();
            tx.lock_balance(player).await.unwrap();
            tx.commit().await.unwrap();
        }
        assert_eq!(store.row_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_adjust_balance_out_of_range() {
        let store = MemoryStore::new();
        store.insert_player(2, Decimal::MAX);

        let mut tx = store.begin().await.unwrap();
        let err = tx.adjust_balance(2, Decimal::ONE).await.unwrap_err();

        assert!(matches!(
            err,
            TransferError::TransactionFailure {
                stage: TxStage::Update,
                ..
            }
        ));
        drop(tx);
        assert_eq!(store.balance(2), Some(Decimal::MAX));
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction() {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));

        let mut first = store.begin().await.unwrap();
        first.lock_balance(1).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), second.lock_balance(1)).await;
        assert!(blocked.is_err(), "second lock must wait for the first scope");

        first.adjust_balance(1, Decimal::from(-10)).await.unwrap();
        first.commit().await.unwrap();

        assert_eq!(
            second.lock_balance(1).await.unwrap(),
            Some(Decimal::from(90))
        );
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.insert_player(1, Decimal::from(100));
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.adjust_balance(1, Decimal::from(5)).await.unwrap();
        let err = tx.commit().await.unwrap_err();

        assert_eq!(err.code(), "TRANSACTION_FAILURE");
        assert_eq!(store.balance(1), Some(Decimal::from(100)));
    }
}
