//! Test support: isolated database schemas and an in-memory store

use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use crate::db::repos::stocks::ensure_quantity;
use crate::db::repos::StockStore;
use crate::error::{Error, Result};
use crate::models::{Pagination, Stock, StockDraft};

const CREATE_STOCK: &str = include_str!("../../migrations/20240101000000_create_stock.up.sql");

/// Pool whose connections all live in a fresh, empty schema.
pub async fn isolated_schema_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let schema = format!("stocks_test_{}", Uuid::new_v4().simple());

    let admin = crate::db::connect_url(&url, 1)
        .await
        .expect("pool creation failed");
    admin
        .execute(format!("CREATE SCHEMA {}", schema).as_str())
        .await
        .expect("schema creation failed");
    admin.close().await;

    let search_path = format!("SET search_path TO {}", schema);
    PgPoolOptions::new()
        .max_connections(5)
        .after_connect(move |conn, _meta| {
            let sql = search_path.clone();
            Box::pin(async move {
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .expect("pool creation failed")
}

/// Isolated schema with the `stock` table already created.
pub async fn isolated_pool() -> PgPool {
    let pool = isolated_schema_pool().await;
    sqlx::raw_sql(CREATE_STOCK)
        .execute(&pool)
        .await
        .expect("stock table creation failed");
    pool
}

/// In-memory [`StockStore`] with the same observable semantics as the
/// Postgres repository.
#[derive(Default)]
pub struct MemoryStockStore {
    rows: Mutex<Vec<Stock>>,
    offline: bool,
    latency: Option<StdDuration>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails like a lost connection.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// A store that answers every call only after `latency`.
    pub fn slow(latency: StdDuration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn enter(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn get_all(&self) -> Result<Vec<Stock>> {
        self.enter().await?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn get_page(&self, page: Pagination) -> Result<Vec<Stock>> {
        self.enter().await?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn get_one(&self, id: Uuid) -> Result<Stock> {
        self.enter().await?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::stock_not_found(id))
    }

    async fn insert_one(&self, stock: StockDraft) -> Result<Stock> {
        self.enter().await?;
        ensure_quantity(stock.quantity)?;

        let mut rows = self.rows.lock().unwrap();
        let id = stock.id.unwrap_or_else(Uuid::new_v4);
        if rows.iter().any(|s| s.id == id) {
            return Err(Error::constraint("id", "a stock with this id already exists"));
        }

        let now = Utc::now();
        let inserted = Stock {
            id,
            name: stock.name,
            quantity: stock.quantity,
            created_at: now,
            updated_at: now,
        };
        rows.push(inserted.clone());
        Ok(inserted)
    }

    async fn update_one(&self, id: Uuid, stock: StockDraft) -> Result<Stock> {
        self.enter().await?;
        ensure_quantity(stock.quantity)?;

        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::stock_not_found(id))?;

        row.name = stock.name;
        row.quantity = stock.quantity;
        row.updated_at = Utc::now().max(row.updated_at + Duration::microseconds(1));
        Ok(row.clone())
    }

    async fn delete_one(&self, id: Uuid) -> Result<()> {
        self.enter().await?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|s| s.id != id);
        if rows.len() == before {
            return Err(Error::stock_not_found(id));
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        self.enter().await?;
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn ping(&self) -> Result<()> {
        self.enter().await
    }
}
