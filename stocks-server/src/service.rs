//! Stock service shared by both front ends
//!
//! Takes wire-level input (string ids, unchecked drafts), validates it and
//! delegates to a [`StockStore`]. Both the REST and the RPC front end hold a
//! clone of the same service and therefore the same repository.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::repos::stocks::ensure_quantity;
use crate::db::repos::StockStore;
use crate::error::Result;
use crate::models::{parse_stock_id, Paginated, Pagination, Stock, StockDraft, StockName};

/// Cheap to clone; clones share the repository.
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
}

/// Outcome of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    Up,
    Down,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// List stocks with the total row count.
    ///
    /// Without pagination every row is returned. The total is counted
    /// separately from the page read.
    pub async fn list(&self, pagination: Option<Pagination>) -> Result<Paginated<Stock>> {
        let items = match pagination {
            Some(page) => self.store.get_page(page).await?,
            None => self.store.get_all().await?,
        };
        let total_count = self.store.count().await?;

        Ok(Paginated {
            items,
            total_count,
            pagination: pagination.map(Into::into),
        })
    }

    pub async fn get(&self, raw_id: &str) -> Result<Stock> {
        let id = parse_stock_id(raw_id)?;
        self.store.get_one(id).await
    }

    pub async fn create(&self, draft: StockDraft) -> Result<Stock> {
        let draft = validate_draft(draft)?;
        let stock = self.store.insert_one(draft).await?;
        tracing::info!(stock_id = %stock.id, name = %stock.name, "stock created");
        Ok(stock)
    }

    /// Replace name and quantity of an existing stock. An id in the body is
    /// ignored in favour of the one addressed.
    pub async fn update(&self, raw_id: &str, draft: StockDraft) -> Result<Stock> {
        let id = parse_stock_id(raw_id)?;
        let draft = validate_draft(draft)?;
        let stock = self.store.update_one(id, draft).await?;
        tracing::info!(stock_id = %id, "stock updated");
        Ok(stock)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<Uuid> {
        let id = parse_stock_id(raw_id)?;
        self.store.delete_one(id).await?;
        tracing::info!(stock_id = %id, "stock deleted");
        Ok(id)
    }

    pub async fn health(&self) -> StoreHealth {
        match self.store.ping().await {
            Ok(()) => StoreHealth::Up,
            Err(e) => {
                tracing::warn!(error = %e, "store ping failed");
                StoreHealth::Down
            }
        }
    }
}

/// A bad name is malformed input; a negative quantity breaches the stored
/// invariant and is reported the same way the repository reports it.
fn validate_draft(draft: StockDraft) -> Result<StockDraft> {
    let name = StockName::new(&draft.name)?;
    ensure_quantity(draft.quantity)?;
    Ok(StockDraft {
        name: name.into_string(),
        ..draft
    })
}
