//! Address directory (SPEC_FULL §4 "Address directory"): a local
//! replica of client addresses, kept current by consuming
//! `client.created`/`client.updated` events, serving the zip-code
//! feasibility check `delivery.check` relies on.
//!
//! Grounded on the original system's `client` service publishing these
//! two event keys and `delivery` consuming them to avoid a cross-service
//! synchronous lookup (`examples/original_source/`).

use sqlx::{Row, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type AddressBookResult<T> = Result<T, AddressBookError>;

/// The zip-code prefixes this port deems deliverable. Hard-coded
/// literal kept as-is per spec.md §9 (Open Question 1): it looks like a
/// placeholder for a real routing policy, but redesigning it is the
/// product owner's call, not this implementation's.
const FEASIBLE_ZIP_PREFIXES: [u32; 3] = [1, 20, 48];

/// A replicated client address.
#[derive(Debug, Clone)]
pub struct ClientAddress {
    pub client_id: String,
    pub address: String,
    pub zip_code: u32,
}

pub struct AddressBook {
    pool: SqlitePool,
}

impl AddressBook {
    pub async fn connect(database_url: &str) -> AddressBookResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let book = Self { pool };
        book.create_tables().await?;
        Ok(book)
    }

    async fn create_tables(&self) -> AddressBookResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS client_address (
                client_id TEXT PRIMARY KEY,
                address TEXT NOT NULL,
                zip_code INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Apply a `client.created`/`client.updated` event: upsert the
    /// replica.
    pub async fn replicate(&self, entry: &ClientAddress) -> AddressBookResult<()> {
        sqlx::query(
            "INSERT INTO client_address (client_id, address, zip_code) VALUES (?, ?, ?)
             ON CONFLICT(client_id) DO UPDATE SET address = excluded.address, zip_code = excluded.zip_code",
        )
        .bind(&entry.client_id)
        .bind(&entry.address)
        .bind(entry.zip_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The replicated address for a client, if known.
    pub async fn get(&self, client_id: &str) -> AddressBookResult<Option<ClientAddress>> {
        let row = sqlx::query("SELECT address, zip_code FROM client_address WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| ClientAddress {
            client_id: client_id.to_string(),
            address: row.get("address"),
            zip_code: row.get::<i64, _>("zip_code") as u32,
        }))
    }

    /// Spec.md §4.4's feasibility predicate: `zip / 1000 ∈ {1, 20, 48}`.
    #[must_use]
    pub fn is_feasible(zip_code: u32) -> bool {
        FEASIBLE_ZIP_PREFIXES.contains(&(zip_code / 1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feasibility_matches_literal_predicate() {
        assert!(AddressBook::is_feasible(20_500));
        assert!(AddressBook::is_feasible(1_999));
        assert!(AddressBook::is_feasible(48_010));
        assert!(!AddressBook::is_feasible(28_000));
    }

    #[tokio::test]
    async fn replicate_then_get_round_trips() {
        let book = AddressBook::connect("sqlite::memory:").await.unwrap();
        book.replicate(&ClientAddress {
            client_id: "7".to_string(),
            address: "Calle Mayor 1".to_string(),
            zip_code: 20_500,
        })
        .await
        .unwrap();

        let address = book.get("7").await.unwrap().unwrap();
        assert_eq!(address.zip_code, 20_500);
    }

    #[tokio::test]
    async fn replicate_twice_updates_in_place() {
        let book = AddressBook::connect("sqlite::memory:").await.unwrap();
        let entry = |zip| ClientAddress {
            client_id: "9".to_string(),
            address: "addr".to_string(),
            zip_code: zip,
        };
        book.replicate(&entry(1_000)).await.unwrap();
        book.replicate(&entry(28_000)).await.unwrap();

        let address = book.get("9").await.unwrap().unwrap();
        assert_eq!(address.zip_code, 28_000);
    }
}
