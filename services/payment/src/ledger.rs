//! Per-client balance ledger (spec.md §4.2), serialized per `client_id`
//! as required by §5's shared-resource policy.
//!
//! Grounded on the teacher's `services-oms::persistence::PersistenceManager`:
//! a pool handle plus raw `sqlx::query` calls, `CREATE TABLE IF NOT
//! EXISTS` bootstrap, no query builder.

use forgemesh_common::Money;
use rustc_hash::FxHashMap;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Errors raised while mutating a client's balance.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("client {client_id} has no account to revert a cancel for order {order_id}")]
    NoCancelToRevert { client_id: String, order_id: Uuid },
}

/// Result alias for this crate.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// A single ledger movement, kept so `revert_cancel` can undo the exact
/// amount `check_cancel` applied for a given order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovementKind {
    Check,
    CheckCancel,
    RevertCancel,
}

impl MovementKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::CheckCancel => "check_cancel",
            Self::RevertCancel => "revert_cancel",
        }
    }
}

/// Owns per-client balances and the movement history behind them.
pub struct PaymentLedger {
    pool: SqlitePool,
    /// One lock per `client_id` so balance read-modify-write is
    /// serialized within this process, matching spec.md §5's
    /// single-writer-per-client policy even though SQLite itself
    /// serializes at the connection level.
    client_locks: parking_lot::Mutex<FxHashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PaymentLedger {
    /// Connect and ensure the backing tables exist.
    pub async fn connect(database_url: &str) -> PaymentResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let ledger = Self {
            pool,
            client_locks: parking_lot::Mutex::new(FxHashMap::default()),
        };
        ledger.create_tables().await?;
        Ok(ledger)
    }

    async fn create_tables(&self) -> PaymentResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS payment_account (
                client_id TEXT PRIMARY KEY,
                balance_cents INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS payment_movement (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL,
                order_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                movement_cents INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn lock_for(&self, client_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.client_locks.lock();
        Arc::clone(
            locks
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    async fn read_balance(&self, client_id: &str) -> PaymentResult<Money> {
        let row = sqlx::query("SELECT balance_cents FROM payment_account WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map_or(Money::ZERO, |row| {
            Money::from_cents(row.get::<i64, _>("balance_cents"))
        }))
    }

    async fn write_balance(&self, client_id: &str, balance: Money) -> PaymentResult<()> {
        sqlx::query(
            "INSERT INTO payment_account (client_id, balance_cents) VALUES (?, ?)
             ON CONFLICT(client_id) DO UPDATE SET balance_cents = excluded.balance_cents",
        )
        .bind(client_id)
        .bind(balance.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_movement(
        &self,
        client_id: &str,
        order_id: Uuid,
        kind: MovementKind,
        movement: Money,
    ) -> PaymentResult<()> {
        sqlx::query(
            "INSERT INTO payment_movement (client_id, order_id, kind, movement_cents, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(client_id)
        .bind(order_id.to_string())
        .bind(kind.as_str())
        .bind(movement.cents())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Current balance, for observability/tests.
    pub async fn balance(&self, client_id: &str) -> PaymentResult<Money> {
        self.read_balance(client_id).await
    }

    /// `payment.check`: debit (or credit) `movement`, refusing when the
    /// result would go negative. Returns whether it was applied.
    pub async fn check(
        &self,
        client_id: &str,
        order_id: Uuid,
        movement: Money,
    ) -> PaymentResult<bool> {
        let lock = self.lock_for(client_id);
        let _guard = lock.lock().await;

        let balance = self.read_balance(client_id).await?;
        let updated = balance + movement;
        if updated.is_negative() {
            return Ok(false);
        }
        self.write_balance(client_id, updated).await?;
        self.record_movement(client_id, order_id, MovementKind::Check, movement)
            .await?;
        Ok(true)
    }

    /// `payment.check_cancel`: always applies `movement` (typically a
    /// credit restoring funds reserved by `check`).
    pub async fn check_cancel(
        &self,
        client_id: &str,
        order_id: Uuid,
        movement: Money,
    ) -> PaymentResult<()> {
        let lock = self.lock_for(client_id);
        let _guard = lock.lock().await;

        let balance = self.read_balance(client_id).await?;
        self.write_balance(client_id, balance + movement).await?;
        self.record_movement(client_id, order_id, MovementKind::CheckCancel, movement)
            .await?;
        Ok(())
    }

    /// `payment.revert_cancel`: undoes the most recent `check_cancel`
    /// movement recorded for this order.
    pub async fn revert_cancel(&self, client_id: &str, order_id: Uuid) -> PaymentResult<Money> {
        let lock = self.lock_for(client_id);
        let _guard = lock.lock().await;

        let row = sqlx::query(
            "SELECT movement_cents FROM payment_movement
             WHERE client_id = ? AND order_id = ? AND kind = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(client_id)
        .bind(order_id.to_string())
        .bind(MovementKind::CheckCancel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(PaymentError::NoCancelToRevert {
                client_id: client_id.to_string(),
                order_id,
            });
        };

        let reverted = Money::from_cents(row.get::<i64, _>("movement_cents"));
        let balance = self.read_balance(client_id).await?;
        self.write_balance(client_id, balance - reverted).await?;
        self.record_movement(client_id, order_id, MovementKind::RevertCancel, -reverted)
            .await?;
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_debits_when_sufficient_balance() {
        let ledger = PaymentLedger::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        ledger
            .check_cancel("client-7", Uuid::new_v4(), Money::from_decimal(100.00))
            .await
            .unwrap();

        let applied = ledger
            .check("client-7", order_id, Money::from_decimal(-11.00))
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(ledger.balance("client-7").await.unwrap(), Money::from_decimal(89.00));
    }

    #[tokio::test]
    async fn check_refuses_when_insufficient_balance() {
        let ledger = PaymentLedger::connect("sqlite::memory:").await.unwrap();
        ledger
            .check_cancel("client-9", Uuid::new_v4(), Money::from_decimal(5.00))
            .await
            .unwrap();

        let applied = ledger
            .check("client-9", Uuid::new_v4(), Money::from_decimal(-11.00))
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(ledger.balance("client-9").await.unwrap(), Money::from_decimal(5.00));
    }

    #[tokio::test]
    async fn check_then_check_cancel_is_identity() {
        let ledger = PaymentLedger::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        ledger
            .check_cancel("client-1", Uuid::new_v4(), Money::from_decimal(100.00))
            .await
            .unwrap();
        let original = ledger.balance("client-1").await.unwrap();

        ledger
            .check("client-1", order_id, -Money::from_decimal(11.00))
            .await
            .unwrap();
        ledger
            .check_cancel("client-1", order_id, Money::from_decimal(11.00))
            .await
            .unwrap();

        assert_eq!(ledger.balance("client-1").await.unwrap(), original);
    }

    #[tokio::test]
    async fn check_cancel_then_revert_cancel_is_identity() {
        let ledger = PaymentLedger::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        ledger
            .check_cancel("client-2", Uuid::new_v4(), Money::from_decimal(100.00))
            .await
            .unwrap();
        let pre_cancel = ledger.balance("client-2").await.unwrap();

        ledger
            .check_cancel("client-2", order_id, Money::from_decimal(11.00))
            .await
            .unwrap();
        ledger.revert_cancel("client-2", order_id).await.unwrap();

        assert_eq!(ledger.balance("client-2").await.unwrap(), pre_cancel);
    }
}
