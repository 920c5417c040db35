//! Stock repository
//!
//! Every mutation is existence-checked under a row lock and runs inside one
//! transaction, so a failure never leaves a half-applied row:
//! - reads take `FOR SHARE`
//! - update/delete resolve the row with `FOR UPDATE` first
//! - `created_at` / `updated_at` are always written here, never by callers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Pagination, Stock, StockDraft};

/// Full CRUD contract over the stock entity.
///
/// Both front ends hold the same `Arc<dyn StockStore>`.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Every row, oldest first. Empty table is an empty vec.
    async fn get_all(&self) -> Result<Vec<Stock>>;

    /// One page of rows, oldest first.
    async fn get_page(&self, page: Pagination) -> Result<Vec<Stock>>;

    /// A single row, `NotFound` if absent.
    async fn get_one(&self, id: Uuid) -> Result<Stock>;

    /// Insert a new row, assigning `id` when the draft has none.
    async fn insert_one(&self, stock: StockDraft) -> Result<Stock>;

    /// Overwrite name and quantity of an existing row.
    async fn update_one(&self, id: Uuid, stock: StockDraft) -> Result<Stock>;

    /// Remove an existing row, `NotFound` if absent.
    async fn delete_one(&self, id: Uuid) -> Result<()>;

    /// Total number of rows.
    async fn count(&self) -> Result<i64>;

    /// Liveness check against the backing store.
    async fn ping(&self) -> Result<()>;
}

/// Last line of defense for the quantity invariant.
pub(crate) fn ensure_quantity(quantity: i64) -> Result<()> {
    if quantity < 0 {
        return Err(Error::constraint(
            "quantity",
            format!("must be >= 0, got {}", quantity),
        ));
    }
    Ok(())
}

/// Translate constraint failures reported by Postgres into their error kind.
fn map_write_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return Error::constraint("id", "a stock with this id already exists");
        }
        if db_err.is_check_violation() {
            return Error::constraint(
                "stock",
                db_err
                    .constraint()
                    .map(|c| format!("check '{}' failed", c))
                    .unwrap_or_else(|| "check constraint failed".to_owned()),
            );
        }
    }
    Error::Database(err)
}

/// Postgres-backed stock repository
#[derive(Clone)]
pub struct PgStockRepo {
    pool: PgPool,
}

impl PgStockRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockStore for PgStockRepo {
    async fn get_all(&self) -> Result<Vec<Stock>> {
        let stocks = sqlx::query_as::<_, Stock>(
            r#"
            SELECT id, name, quantity, created_at, updated_at
            FROM stock
            ORDER BY created_at, id
            FOR SHARE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(stocks)
    }

    async fn get_page(&self, page: Pagination) -> Result<Vec<Stock>> {
        let stocks = sqlx::query_as::<_, Stock>(
            r#"
            SELECT id, name, quantity, created_at, updated_at
            FROM stock
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2
            FOR SHARE
            "#,
        )
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(stocks)
    }

    async fn get_one(&self, id: Uuid) -> Result<Stock> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM stock WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if !exists.0 {
            return Err(Error::stock_not_found(id));
        }

        // The row can still vanish between the two statements.
        sqlx::query_as::<_, Stock>(
            r#"
            SELECT id, name, quantity, created_at, updated_at
            FROM stock
            WHERE id = $1
            FOR SHARE
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::stock_not_found(id))
    }

    async fn insert_one(&self, stock: StockDraft) -> Result<Stock> {
        ensure_quantity(stock.quantity)?;

        let id = stock.id.unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Stock>(
            r#"
            INSERT INTO stock (id, name, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, quantity, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&stock.name)
        .bind(stock.quantity)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        tracing::debug!(stock_id = %inserted.id, "stock inserted");
        Ok(inserted)
    }

    async fn update_one(&self, id: Uuid, stock: StockDraft) -> Result<Stock> {
        ensure_quantity(stock.quantity)?;

        let mut tx = self.pool.begin().await?;

        let current: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT created_at FROM stock WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let (created_at,) = current.ok_or_else(|| Error::stock_not_found(id))?;

        // GREATEST keeps updated_at strictly increasing even when two writes
        // land within the same clock tick.
        let updated = sqlx::query_as::<_, Stock>(
            r#"
            UPDATE stock
            SET name = $2,
                quantity = $3,
                created_at = $4,
                updated_at = GREATEST($5, updated_at + INTERVAL '1 microsecond')
            WHERE id = $1
            RETURNING id, name, quantity, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&stock.name)
        .bind(stock.quantity)
        .bind(created_at)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        tracing::debug!(stock_id = %id, "stock updated");
        Ok(updated)
    }

    async fn delete_one(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM stock WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if locked.is_none() {
            return Err(Error::stock_not_found(id));
        }

        sqlx::query("DELETE FROM stock WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(stock_id = %id, "stock deleted");
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn ping(&self) -> Result<()> {
        crate::db::pool::ping(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::isolated_pool;

    // Integration tests - run with DATABASE_URL set
    // cargo test -p stocks-server -- --ignored

    async fn repo() -> PgStockRepo {
        PgStockRepo::new(isolated_pool().await)
    }

    #[test]
    fn quantity_guard() {
        assert!(ensure_quantity(0).is_ok());
        assert_eq!(
            ensure_quantity(-3).unwrap_err().kind(),
            ErrorKind::ConstraintViolation
        );
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn get_all_on_empty_table_is_empty() {
        let repo = repo().await;
        assert!(repo.get_all().await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_then_get_round_trips() {
        let repo = repo().await;
        let inserted = repo.insert_one(StockDraft::new("widget", 5)).await.unwrap();

        let fetched = repo.get_one(inserted.id).await.unwrap();
        assert_eq!(fetched.name, "widget");
        assert_eq!(fetched.quantity, 5);
        assert_eq!(fetched.updated_at, fetched.created_at);
        assert_eq!(fetched, inserted);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_keeps_caller_id_and_discards_timestamps() {
        let repo = repo().await;
        let id = Uuid::new_v4();
        let stale = DateTime::parse_from_rfc3339("2001-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let draft = StockDraft {
            id: Some(id),
            created_at: Some(stale),
            updated_at: Some(stale),
            ..StockDraft::new("bolt", 1)
        };

        let inserted = repo.insert_one(draft).await.unwrap();
        assert_eq!(inserted.id, id);
        assert!(inserted.created_at > stale);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_id_is_constraint_violation() {
        let repo = repo().await;
        let first = repo.insert_one(StockDraft::new("nut", 1)).await.unwrap();
        let dup = StockDraft {
            id: Some(first.id),
            ..StockDraft::new("nut", 2)
        };

        let err = repo.insert_one(dup).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(repo.get_one(first.id).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn update_preserves_created_at() {
        let repo = repo().await;
        let inserted = repo.insert_one(StockDraft::new("widget", 5)).await.unwrap();

        let forged = StockDraft {
            created_at: Some(inserted.created_at - chrono::Duration::days(30)),
            ..StockDraft::new("widget", 3)
        };
        let updated = repo.update_one(inserted.id, forged).await.unwrap();

        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.created_at, inserted.created_at);
        assert!(updated.updated_at > inserted.updated_at);

        let again = repo
            .update_one(inserted.id, StockDraft::new("widget", 4))
            .await
            .unwrap();
        assert!(again.updated_at > updated.updated_at);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn negative_quantity_never_persists() {
        let repo = repo().await;

        let err = repo.insert_one(StockDraft::new("widget", -1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(repo.count().await.unwrap(), 0);

        let inserted = repo.insert_one(StockDraft::new("widget", 2)).await.unwrap();
        let err = repo
            .update_one(inserted.id, StockDraft::new("widget", -7))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(repo.get_one(inserted.id).await.unwrap(), inserted);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn missing_rows_are_not_found() {
        let repo = repo().await;
        repo.insert_one(StockDraft::new("widget", 1)).await.unwrap();
        let missing = Uuid::new_v4();

        assert_eq!(repo.get_one(missing).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            repo.update_one(missing, StockDraft::new("x", 1))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(repo.delete_one(missing).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn widget_lifecycle() {
        let repo = repo().await;
        let a = repo.insert_one(StockDraft::new("widget", 5)).await.unwrap();
        assert_eq!(repo.get_one(a.id).await.unwrap().quantity, 5);

        repo.update_one(a.id, StockDraft::new("widget", 3)).await.unwrap();
        let after = repo.get_one(a.id).await.unwrap();
        assert_eq!(after.quantity, 3);
        assert_eq!(after.created_at, a.created_at);
        assert_ne!(after.updated_at, a.updated_at);

        repo.delete_one(a.id).await.unwrap();
        assert_eq!(repo.get_one(a.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pages_are_ordered_and_counted() {
        let repo = repo().await;
        for i in 0..5 {
            repo.insert_one(StockDraft::new(format!("item {}", i), i))
                .await
                .unwrap();
        }

        let second = repo.get_page(Pagination::new(2, 2)).await.unwrap();
        let names: Vec<_> = second.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["item 2", "item 3"]);
        assert_eq!(repo.count().await.unwrap(), 5);
        assert!(repo.get_page(Pagination::new(9, 2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_updates_serialize() {
        let repo = repo().await;
        let stock = repo.insert_one(StockDraft::new("widget", 0)).await.unwrap();
        let id = stock.id;

        let handles: Vec<_> = (1..=8)
            .map(|q| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.update_one(id, StockDraft::new("widget", q)).await })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap().unwrap().updated_at);
        }
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), 8);
        assert_eq!(repo.get_one(stock.id).await.unwrap().created_at, stock.created_at);
    }
}
