//! Append-only saga history (spec.md §4.6), backed by `sqlx`/SQLite.
//!
//! Grounded on the teacher's `services-oms::audit::AuditTrail`: a pool
//! handle, a `create_tables()` bootstrap, and append-then-read methods
//! built on raw `sqlx::query`/`query_as` calls rather than a query
//! builder, matching the teacher's style.

use crate::error::{SagaError, SagaResult};
use crate::order::OrderStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// One row of saga history: `(order_id, status, timestamp)`, per
/// spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaEntry {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

/// The append-only saga log, one row per order status transition.
pub struct SagaLog {
    pool: SqlitePool,
}

impl SagaLog {
    /// Connect and ensure the backing table exists.
    pub async fn connect(database_url: &str) -> SagaResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let log = Self { pool };
        log.create_tables().await?;
        Ok(log)
    }

    async fn create_tables(&self) -> SagaResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS saga_entry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL,
                status TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_saga_entry_order ON saga_entry(order_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Append one transition. Spec.md §4.1 invariant 1: this must be
    /// called, and awaited, before any outbound command for the new
    /// status is published.
    pub async fn append(&self, order_id: Uuid, status: OrderStatus) -> SagaResult<SagaEntry> {
        let timestamp = Utc::now();
        sqlx::query("INSERT INTO saga_entry (order_id, status, timestamp) VALUES (?, ?, ?)")
            .bind(order_id.to_string())
            .bind(status.to_string())
            .bind(timestamp.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(SagaEntry {
            order_id,
            status,
            timestamp,
        })
    }

    /// The ordered history of an order: every transition it has ever
    /// made, oldest first.
    pub async fn history(&self, order_id: Uuid) -> SagaResult<Vec<SagaEntry>> {
        let rows = sqlx::query(
            "SELECT status, timestamp FROM saga_entry WHERE order_id = ? ORDER BY id ASC",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.get("status");
                let timestamp: String = row.get("timestamp");
                Ok(SagaEntry {
                    order_id,
                    status: status
                        .parse()
                        .map_err(|_| SagaError::OrderNotFound { order_id })?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|_| SagaError::OrderNotFound { order_id })?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }

    /// The current status: the most recent entry's status. Spec.md
    /// §8 P1: this must always equal the order row's `status` field.
    pub async fn current_status(&self, order_id: Uuid) -> SagaResult<Option<OrderStatus>> {
        let row = sqlx::query(
            "SELECT status FROM saga_entry WHERE order_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            status
                .parse()
                .map_err(|_| SagaError::OrderNotFound { order_id })
        })
        .transpose()
    }

    /// "Has the payment segment already been written for this order?"
    /// (spec.md §9, Open Question 3): consulted as a `COUNT` and used
    /// as a boolean, guarding the orchestrator against mutating on a
    /// duplicate `payment.checked` response (spec.md §4.1 invariant 3).
    pub async fn has_payment_segment(&self, order_id: Uuid) -> SagaResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM saga_entry WHERE order_id = ? AND status = ?",
        )
        .bind(order_id.to_string())
        .bind(OrderStatus::PaymentPending.to_string())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("n");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_history_round_trips() {
        let log = SagaLog::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();

        log.append(order_id, OrderStatus::DeliveryPending)
            .await
            .unwrap();
        log.append(order_id, OrderStatus::PaymentPending)
            .await
            .unwrap();
        log.append(order_id, OrderStatus::Queued).await.unwrap();

        let history = log.history(order_id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].status, OrderStatus::DeliveryPending);
        assert_eq!(history[2].status, OrderStatus::Queued);
        assert_eq!(
            log.current_status(order_id).await.unwrap(),
            Some(OrderStatus::Queued)
        );
    }

    #[tokio::test]
    async fn has_payment_segment_is_false_until_payment_pending_recorded() {
        let log = SagaLog::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();

        assert!(!log.has_payment_segment(order_id).await.unwrap());

        log.append(order_id, OrderStatus::DeliveryPending)
            .await
            .unwrap();
        assert!(!log.has_payment_segment(order_id).await.unwrap());

        log.append(order_id, OrderStatus::PaymentPending)
            .await
            .unwrap();
        assert!(log.has_payment_segment(order_id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_order_has_no_history() {
        let log = SagaLog::connect("sqlite::memory:").await.unwrap();
        let history = log.history(Uuid::new_v4()).await.unwrap();
        assert!(history.is_empty());
    }
}
