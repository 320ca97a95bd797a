//! Piece inventory (spec.md §4.3): reservation against existing stock,
//! fabrication requests for shortfall, and the cancel/release path.
//!
//! Grounded on the teacher's `services-oms::persistence::PersistenceManager`
//! raw-`sqlx::query` style; inventory ownership is consolidated here per
//! spec.md §9 ("shared mutable `Piece.status`... is consolidated in the
//! warehouse; other services observe via events only").

use forgemesh_common::PieceType;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// A single piece's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceStatus {
    Queued,
    Produced,
    Shipped,
}

impl PieceStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Produced => "Produced",
            Self::Shipped => "Shipped",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "Queued" => Self::Queued,
            "Shipped" => Self::Shipped,
            _ => Self::Produced,
        }
    }
}

/// The outcome of reserving-or-fabricating one piece type for an order.
pub struct ReservationOutcome {
    /// Piece ids that were newly queued for fabrication (empty if stock
    /// fully covered the request).
    pub queued_piece_ids: Vec<Uuid>,
}

pub struct Inventory {
    pool: SqlitePool,
}

impl Inventory {
    pub async fn connect(database_url: &str) -> InventoryResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let inventory = Self { pool };
        inventory.create_tables().await?;
        Ok(inventory)
    }

    async fn create_tables(&self) -> InventoryResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS piece (
                piece_id TEXT PRIMARY KEY,
                piece_type TEXT NOT NULL,
                status TEXT NOT NULL,
                order_id TEXT,
                client_id TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_piece_order ON piece(order_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reserve `count` pieces of `piece_type` for `order_id`, taking
    /// reservable stock first and queueing fabrication for any
    /// shortfall (spec.md §4.3 step 1/2).
    pub async fn reserve_or_queue(
        &self,
        order_id: Uuid,
        client_id: &str,
        piece_type: PieceType,
        count: u32,
    ) -> InventoryResult<ReservationOutcome> {
        let mut queued_piece_ids = Vec::new();

        for _ in 0..count {
            let reserved = sqlx::query(
                "SELECT piece_id FROM piece
                 WHERE piece_type = ? AND status = 'Produced' AND order_id IS NULL
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(piece_type.to_string())
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = reserved {
                let piece_id: String = row.get("piece_id");
                sqlx::query(
                    "UPDATE piece SET order_id = ?, client_id = ? WHERE piece_id = ?",
                )
                .bind(order_id.to_string())
                .bind(client_id)
                .bind(&piece_id)
                .execute(&self.pool)
                .await?;
                continue;
            }

            let piece_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO piece (piece_id, piece_type, status, order_id, client_id, created_at)
                 VALUES (?, ?, 'Queued', ?, ?, ?)",
            )
            .bind(piece_id.to_string())
            .bind(piece_type.to_string())
            .bind(order_id.to_string())
            .bind(client_id)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
            queued_piece_ids.push(piece_id);
        }

        Ok(ReservationOutcome { queued_piece_ids })
    }

    /// Mark a piece `Produced` once fabrication reports it done.
    pub async fn mark_produced(&self, piece_id: Uuid) -> InventoryResult<()> {
        sqlx::query("UPDATE piece SET status = 'Produced' WHERE piece_id = ?")
            .bind(piece_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether every piece belonging to `order_id` is `Produced` (i.e.
    /// the order is ready for `orders.produced`).
    pub async fn all_pieces_produced(&self, order_id: Uuid) -> InventoryResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM piece WHERE order_id = ? AND status != 'Produced'",
        )
        .bind(order_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        let remaining: i64 = row.get("n");
        Ok(remaining == 0)
    }

    /// Attempt to release every piece belonging to `order_id`
    /// (`warehouse.check_cancel`). Fails (returns `false`) if any piece
    /// has already moved to `Shipped`; otherwise every piece rolls back
    /// to `(Produced, order_id=None)` per spec.md §4.3's monotonicity
    /// invariant and the order is released.
    pub async fn release_order(&self, order_id: Uuid) -> InventoryResult<bool> {
        let shipped = sqlx::query(
            "SELECT COUNT(*) as n FROM piece WHERE order_id = ? AND status = 'Shipped'",
        )
        .bind(order_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        let shipped_count: i64 = shipped.get("n");
        if shipped_count > 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE piece SET status = 'Produced', order_id = NULL, client_id = NULL
             WHERE order_id = ?",
        )
        .bind(order_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    /// `orders.delivering`: every piece of the order moves `Produced ->
    /// Shipped`.
    pub async fn mark_order_shipped(&self, order_id: Uuid) -> InventoryResult<()> {
        sqlx::query("UPDATE piece SET status = 'Shipped' WHERE order_id = ? AND status = 'Produced'")
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The piece type (needed to route `piece.produced` back to the
    /// right counter) and order id of a piece, for observability and
    /// testing.
    pub async fn piece_status(&self, piece_id: Uuid) -> InventoryResult<Option<(PieceStatus, Option<Uuid>)>> {
        let row = sqlx::query("SELECT status, order_id FROM piece WHERE piece_id = ?")
            .bind(piece_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| {
            let status: String = row.get("status");
            let order_id: Option<String> = row.get("order_id");
            (
                PieceStatus::parse(&status),
                order_id.and_then(|s| Uuid::parse_str(&s).ok()),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_queues_fabrication_when_stock_empty() {
        let inventory = Inventory::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(order_id, "client-7", PieceType::A, 2)
            .await
            .unwrap();
        assert_eq!(outcome.queued_piece_ids.len(), 2);
        assert!(!inventory.all_pieces_produced(order_id).await.unwrap());
    }

    #[tokio::test]
    async fn reserve_uses_existing_stock_before_queueing() {
        let inventory = Inventory::connect("sqlite::memory:").await.unwrap();
        let stocked_order = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(stocked_order, "client-0", PieceType::A, 1)
            .await
            .unwrap();
        inventory
            .mark_produced(outcome.queued_piece_ids[0])
            .await
            .unwrap();
        // release it back to the free pool
        inventory.release_order(stocked_order).await.unwrap();

        let order_id = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(order_id, "client-1", PieceType::A, 1)
            .await
            .unwrap();
        assert!(outcome.queued_piece_ids.is_empty());
        assert!(inventory.all_pieces_produced(order_id).await.unwrap());
    }

    #[tokio::test]
    async fn release_order_fails_once_shipped() {
        let inventory = Inventory::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(order_id, "client-3", PieceType::B, 1)
            .await
            .unwrap();
        inventory
            .mark_produced(outcome.queued_piece_ids[0])
            .await
            .unwrap();
        inventory.mark_order_shipped(order_id).await.unwrap();

        let released = inventory.release_order(order_id).await.unwrap();
        assert!(!released);
    }

    #[tokio::test]
    async fn release_order_returns_pieces_to_reservable_pool() {
        let inventory = Inventory::connect("sqlite::memory:").await.unwrap();
        let order_id = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(order_id, "client-4", PieceType::A, 1)
            .await
            .unwrap();
        inventory
            .mark_produced(outcome.queued_piece_ids[0])
            .await
            .unwrap();

        let released = inventory.release_order(order_id).await.unwrap();
        assert!(released);

        let other_order = Uuid::new_v4();
        let outcome = inventory
            .reserve_or_queue(other_order, "client-5", PieceType::A, 1)
            .await
            .unwrap();
        assert!(outcome.queued_piece_ids.is_empty());
    }
}
