//! The `order` table (spec.md §3, §6): the physical row backing
//! `Order`, written only by the orchestrator.
//!
//! Grounded on the teacher's `services-oms::persistence::PersistenceManager`
//! upsert style (`ON CONFLICT ... DO UPDATE`).

use forgemesh_saga::{Order, OrderStatus};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("order {0} not found")]
    NotFound(Uuid),
}

pub type OrderStoreResult<T> = Result<T, OrderStoreError>;

pub struct OrderStore {
    pool: SqlitePool,
}

impl OrderStore {
    pub async fn connect(database_url: &str) -> OrderStoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> OrderStoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS \"order\" (
                order_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                count_a INTEGER NOT NULL,
                count_b INTEGER NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert(&self, order: &Order) -> OrderStoreResult<()> {
        sqlx::query(
            "INSERT INTO \"order\"
                (order_id, client_id, count_a, count_b, description, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.order_id.to_string())
        .bind(&order.client_id)
        .bind(order.count_a)
        .bind(order.count_b)
        .bind(&order.description)
        .bind(order.status.to_string())
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, order_id: Uuid) -> OrderStoreResult<Option<Order>> {
        let row = sqlx::query(
            "SELECT client_id, count_a, count_b, description, status, created_at, updated_at
             FROM \"order\" WHERE order_id = ?",
        )
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");
            Ok(Order {
                order_id,
                client_id: row.get("client_id"),
                count_a: row.get::<i64, _>("count_a") as u32,
                count_b: row.get::<i64, _>("count_b") as u32,
                description: row.get("description"),
                status: status
                    .parse()
                    .map_err(|_| OrderStoreError::NotFound(order_id))?,
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|_| OrderStoreError::NotFound(order_id))?
                    .with_timezone(&chrono::Utc),
                updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(|_| OrderStoreError::NotFound(order_id))?
                    .with_timezone(&chrono::Utc),
            })
        })
        .transpose()
    }

    /// `PUT /order/update/{order_id}`: admin-only partial update of the
    /// free-text description; counts and status stay saga-owned.
    pub async fn update_description(
        &self,
        order_id: Uuid,
        description: &str,
    ) -> OrderStoreResult<()> {
        let changed = sqlx::query(
            "UPDATE \"order\" SET description = ?, updated_at = ? WHERE order_id = ?",
        )
        .bind(description)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(order_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if changed == 0 {
            return Err(OrderStoreError::NotFound(order_id));
        }
        Ok(())
    }

    /// Set the order's status column. Callers append to the saga log
    /// first (spec.md §4.1 invariant 1); this is the second half of
    /// that atomic-in-spirit pair.
    pub async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> OrderStoreResult<()> {
        let changed = sqlx::query("UPDATE \"order\" SET status = ?, updated_at = ? WHERE order_id = ?")
            .bind(status.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if changed == 0 {
            return Err(OrderStoreError::NotFound(order_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = OrderStore::connect("sqlite::memory:").await.unwrap();
        let order = Order::new("client-7".to_string(), 2, 1, "two A one B".to_string());
        store.insert(&order).await.unwrap();

        let fetched = store.get(order.order_id).await.unwrap().unwrap();
        assert_eq!(fetched.client_id, "client-7");
        assert_eq!(fetched.status, OrderStatus::DeliveryPending);
    }

    #[tokio::test]
    async fn set_status_updates_row() {
        let store = OrderStore::connect("sqlite::memory:").await.unwrap();
        let order = Order::new("client-7".to_string(), 1, 0, "one A".to_string());
        store.insert(&order).await.unwrap();

        store
            .set_status(order.order_id, OrderStatus::PaymentPending)
            .await
            .unwrap();
        let fetched = store.get(order.order_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::PaymentPending);
    }
}
