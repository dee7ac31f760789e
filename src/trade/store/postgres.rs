//! PostgreSQL Trade Store
//!
//! Row locks are taken with `SELECT ... FOR UPDATE` on `players` and
//! `inventory`. The wrapped `sqlx::Transaction` rolls back on drop, so a
//! scope that never reaches `commit` leaves no trace.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{TradeStore, TradeTx};
use crate::trade::error::{TransferError, TxStage};
use crate::trade::types::{ItemId, Money, PlayerId};

/// SQLSTATE lock_not_available (raised by `lock_timeout`)
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE query_canceled (raised by `statement_timeout`)
const QUERY_CANCELED: &str = "57014";

/// Map a driver error to a transfer error
///
/// Lock and statement timeouts become [`TransferError::Timeout`]; everything
/// else is a storage failure at `stage`.
pub fn classify_sqlx(stage: TxStage, e: sqlx::Error) -> TransferError {
    if let Some(db_err) = e.as_database_error() {
        if matches!(
            db_err.code().as_deref(),
            Some(LOCK_NOT_AVAILABLE) | Some(QUERY_CANCELED)
        ) {
            return TransferError::Timeout;
        }
    }
    TransferError::storage(stage, e.to_string())
}

/// PostgreSQL-backed store
pub struct PgTradeStore {
    pool: PgPool,
    /// Per-transaction `lock_timeout`; zero leaves the server default
    lock_timeout: Duration,
}

impl PgTradeStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn TradeTx>, TransferError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify_sqlx(TxStage::Begin, e))?;

        let lock_ms = self.lock_timeout.as_millis();
        if lock_ms > 0 {
            // SET does not take bind parameters; the value is an integer we format ourselves
            let stmt = format!("SET LOCAL lock_timeout = '{}ms'", lock_ms);
            sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&stmt))
                .await
                .map_err(|e| classify_sqlx(TxStage::Begin, e))?;
        }

        Ok(Box::new(PgTradeTx { tx }))
    }

    async fn ping(&self) -> Result<(), TransferError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| classify_sqlx(TxStage::Query, e))?;
        Ok(())
    }
}

/// Open PostgreSQL transaction
pub struct PgTradeTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TradeTx for PgTradeTx {
    async fn lock_balance(&mut self, player_id: PlayerId) -> Result<Option<Money>, TransferError> {
        debug!(player_id, "Locking player balance");
        sqlx::query_scalar::<_, Money>(
            "SELECT player_money_amount FROM players WHERE player_id = $1 FOR UPDATE",
        )
        .bind(player_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify_sqlx(TxStage::Query, e))
    }

    async fn adjust_balance(
        &mut self,
        player_id: PlayerId,
        delta: Money,
    ) -> Result<(), TransferError> {
        let result = sqlx::query(
            "UPDATE players SET player_money_amount = player_money_amount + $1 WHERE player_id = $2",
        )
        .bind(delta)
        .bind(player_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify_sqlx(TxStage::Update, e))?;

        // The row is locked by this transaction, so it cannot have vanished
        if result.rows_affected() != 1 {
            return Err(TransferError::storage(
                TxStage::Update,
                format!(
                    "balance update for player {} touched {} rows",
                    player_id,
                    result.rows_affected()
                ),
            ));
        }
        Ok(())
    }

    async fn lock_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
    ) -> Result<Option<i64>, TransferError> {
        debug!(player_id, item_id, "Locking inventory line");
        sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM inventory WHERE player_id = $1 AND item_id = $2 FOR UPDATE",
        )
        .bind(player_id)
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify_sqlx(TxStage::Query, e))
    }

    async fn set_quantity(
        &mut self,
        player_id: PlayerId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<(), TransferError> {
        let result = sqlx::query(
            "UPDATE inventory SET quantity = $1 WHERE player_id = $2 AND item_id = $3",
        )
        .bind(quantity)
        .bind(player_id)
        .bind(item_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify_sqlx(TxStage::Update, e))?;

        if result.rows_affected() != 1 {
            return Err(TransferError::storage(
                TxStage::Update,
                format!(
                    "inventory update for player {} item {} touched {} rows",
                    player_id,
                    item_id,
                    result.rows_affected()
                ),
            ));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), TransferError> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| classify_sqlx(TxStage::Commit, e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), TransferError> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| classify_sqlx(TxStage::Rollback, e))
    }
}
