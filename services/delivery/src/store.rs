//! Delivery status tracking (spec.md §4.4, §3 `Delivery`).

use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeliveryStoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("no delivery row for order {0}")]
    NotFound(Uuid),
}

pub type DeliveryStoreResult<T> = Result<T, DeliveryStoreError>;

/// One-to-one with `Order` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Created,
    Delivering,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Delivering => "Delivering",
            Self::Delivered => "Delivered",
            Self::Canceled => "Canceled",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "Delivering" => Self::Delivering,
            "Delivered" => Self::Delivered,
            "Canceled" => Self::Canceled,
            _ => Self::Created,
        }
    }
}

pub struct DeliveryStore {
    pool: SqlitePool,
}

impl DeliveryStore {
    pub async fn connect(database_url: &str) -> DeliveryStoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> DeliveryStoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS delivery (
                order_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                status TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `delivery.check`'s outcome: a fresh row in `Created` or
    /// `Canceled`.
    pub async fn create(
        &self,
        order_id: Uuid,
        client_id: &str,
        status: DeliveryStatus,
    ) -> DeliveryStoreResult<()> {
        sqlx::query(
            "INSERT INTO delivery (order_id, client_id, status) VALUES (?, ?, ?)
             ON CONFLICT(order_id) DO UPDATE SET status = excluded.status",
        )
        .bind(order_id.to_string())
        .bind(client_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn status(&self, order_id: Uuid) -> DeliveryStoreResult<Option<DeliveryStatus>> {
        let row = sqlx::query("SELECT status FROM delivery WHERE order_id = ?")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| DeliveryStatus::parse(&row.get::<String, _>("status"))))
    }

    /// Explicit status set, per spec.md §9 (Open Question 2): only the
    /// "set status explicitly" form of `update_delivery` is implemented.
    pub async fn set_status(
        &self,
        order_id: Uuid,
        status: DeliveryStatus,
    ) -> DeliveryStoreResult<()> {
        let changed = sqlx::query("UPDATE delivery SET status = ? WHERE order_id = ?")
            .bind(status.as_str())
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if changed == 0 {
            return Err(DeliveryStoreError::NotFound(order_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let store = DeliveryStore::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        store
            .create(order_id, "client-7", DeliveryStatus::Created)
            .await
            .unwrap();
        assert_eq!(
            store.status(order_id).await.unwrap(),
            Some(DeliveryStatus::Created)
        );
    }

    #[tokio::test]
    async fn set_status_updates_existing_row() {
        let store = DeliveryStore::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        store
            .create(order_id, "client-7", DeliveryStatus::Created)
            .await
            .unwrap();
        store
            .set_status(order_id, DeliveryStatus::Delivering)
            .await
            .unwrap();
        assert_eq!(
            store.status(order_id).await.unwrap(),
            Some(DeliveryStatus::Delivering)
        );
    }

    #[tokio::test]
    async fn set_status_on_unknown_order_errors() {
        let store = DeliveryStore::connect("sqlite::memory:").await.unwrap();
        let err = store
            .set_status(Uuid::new_v4(), DeliveryStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryStoreError::NotFound(_)));
    }
}
