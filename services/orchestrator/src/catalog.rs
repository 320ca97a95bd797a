//! Catalog (spec.md §2 "Catalog", §3 `Catalog`): per-piece-type
//! pricing, read at publish time to compute an order's total cost.

use forgemesh_common::{Money, PieceType};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Seed prices matching spec.md §8's end-to-end scenarios
/// (`A: 3.00`, `B: 5.00`); the table is overwritten by a real pricing
/// feed in a production deployment, not by this core.
const SEED_PRICE_A_CENTS: i64 = 300;
const SEED_PRICE_B_CENTS: i64 = 500;

pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub async fn connect(database_url: &str) -> CatalogResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let catalog = Self { pool };
        catalog.create_tables().await?;
        catalog.seed_if_empty().await?;
        Ok(catalog)
    }

    async fn create_tables(&self) -> CatalogResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS catalog (
                piece_type TEXT PRIMARY KEY,
                price_cents INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn seed_if_empty(&self) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO catalog (piece_type, price_cents) VALUES (?, ?)
             ON CONFLICT(piece_type) DO NOTHING",
        )
        .bind(PieceType::A.to_string())
        .bind(SEED_PRICE_A_CENTS)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "INSERT INTO catalog (piece_type, price_cents) VALUES (?, ?)
             ON CONFLICT(piece_type) DO NOTHING",
        )
        .bind(PieceType::B.to_string())
        .bind(SEED_PRICE_B_CENTS)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The current price of one piece of `piece_type`.
    pub async fn price(&self, piece_type: PieceType) -> CatalogResult<Money> {
        let row = sqlx::query("SELECT price_cents FROM catalog WHERE piece_type = ?")
            .bind(piece_type.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(Money::from_cents(row.get("price_cents")))
    }

    /// `total_cost = count_a * price_A + count_b * price_B`
    /// (spec.md §4.1), read at publish time.
    pub async fn total_cost(&self, count_a: u32, count_b: u32) -> CatalogResult<Money> {
        let price_a = self.price(PieceType::A).await?;
        let price_b = self.price(PieceType::B).await?;
        Ok(Money::from_cents(
            price_a.cents() * i64::from(count_a) + price_b.cents() * i64::from(count_b),
        ))
    }

    /// `GET /order/catalog`: the full `(type, price)` list.
    pub async fn list(&self) -> CatalogResult<Vec<(PieceType, Money)>> {
        Ok(vec![
            (PieceType::A, self.price(PieceType::A).await?),
            (PieceType::B, self.price(PieceType::B).await?),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn total_cost_matches_happy_path_scenario() {
        let catalog = Catalog::connect("sqlite::memory:").await.unwrap();
        let total = catalog.total_cost(2, 1).await.unwrap();
        assert_eq!(total, Money::from_decimal(11.00));
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let catalog = Catalog::connect("sqlite::memory:").await.unwrap();
        catalog.seed_if_empty().await.unwrap();
        assert_eq!(catalog.price(PieceType::A).await.unwrap(), Money::from_decimal(3.00));
    }
}
