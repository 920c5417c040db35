//! StockService RPC handlers

use chrono::{DateTime, Utc};
use prost_types::Timestamp;
use tonic::{Request, Response, Status};

use super::proto::{self, stock_service_server::StockService as StockServiceRpc};
use crate::error::Error;
use crate::models::{parse_stock_id, Pagination, Stock, StockDraft};
use crate::service::StockService;

impl From<Error> for Status {
    fn from(e: Error) -> Self {
        match &e {
            Error::Validation(v) => Status::invalid_argument(v.to_string()),
            Error::NotFound { .. } => Status::not_found(e.to_string()),
            Error::ConstraintViolation { .. } => Status::failed_precondition(e.to_string()),
            _ => {
                tracing::error!("Internal error: {}", e);
                Status::internal("an internal error occurred")
            }
        }
    }
}

fn to_timestamp(at: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

fn from_timestamp(ts: Timestamp) -> Option<DateTime<Utc>> {
    u32::try_from(ts.nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(ts.seconds, nanos))
}

impl From<Stock> for proto::Stock {
    fn from(stock: Stock) -> Self {
        Self {
            id: stock.id.to_string(),
            name: stock.name,
            quantity: stock.quantity,
            created_at: Some(to_timestamp(stock.created_at)),
            updated_at: Some(to_timestamp(stock.updated_at)),
        }
    }
}

impl TryFrom<proto::Stock> for StockDraft {
    type Error = Error;

    /// An empty id means "assign one".
    fn try_from(stock: proto::Stock) -> Result<Self, Self::Error> {
        let id = if stock.id.trim().is_empty() {
            None
        } else {
            Some(parse_stock_id(&stock.id)?)
        };

        Ok(Self {
            id,
            name: stock.name,
            quantity: stock.quantity,
            created_at: stock.created_at.and_then(from_timestamp),
            updated_at: stock.updated_at.and_then(from_timestamp),
        })
    }
}

impl From<proto::Pagination> for Pagination {
    fn from(p: proto::Pagination) -> Self {
        // Zero is the proto3 default for "unset".
        let page = if p.page == 0 { 1 } else { p.page };
        let per_page = if p.items_per_page == 0 {
            crate::models::pagination::DEFAULT_PER_PAGE
        } else {
            p.items_per_page
        };
        Pagination::new(page, per_page)
    }
}

fn required_stock(stock: Option<proto::Stock>) -> Result<StockDraft, Status> {
    let stock = stock.ok_or_else(|| Status::invalid_argument("stock is required"))?;
    Ok(StockDraft::try_from(stock)?)
}

/// gRPC adapter over the shared [`StockService`]
#[derive(Clone)]
pub struct StockRpc {
    service: StockService,
}

impl StockRpc {
    pub fn new(service: StockService) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl StockServiceRpc for StockRpc {
    async fn get_stock(
        &self,
        request: Request<proto::GetStockRequest>,
    ) -> Result<Response<proto::GetStockResponse>, Status> {
        let stock = self.service.get(&request.into_inner().id).await?;
        Ok(Response::new(proto::GetStockResponse {
            stock: Some(stock.into()),
        }))
    }

    async fn list_stocks(
        &self,
        request: Request<proto::ListStocksRequest>,
    ) -> Result<Response<proto::ListStocksResponse>, Status> {
        let pagination = request.into_inner().pagination.map(Pagination::from);
        let page = self.service.list(pagination).await?.map(proto::Stock::from);
        Ok(Response::new(proto::ListStocksResponse {
            stocks: page.items,
            total_count: page.total_count,
        }))
    }

    async fn create_stock(
        &self,
        request: Request<proto::CreateStockRequest>,
    ) -> Result<Response<proto::CreateStockResponse>, Status> {
        let draft = required_stock(request.into_inner().stock)?;
        let stock = self.service.create(draft).await?;
        Ok(Response::new(proto::CreateStockResponse {
            stock: Some(stock.into()),
        }))
    }

    async fn edit_stock(
        &self,
        request: Request<proto::EditStockRequest>,
    ) -> Result<Response<proto::EditStockResponse>, Status> {
        let request = request.into_inner();
        let draft = required_stock(request.stock)?;
        let stock = self.service.update(&request.id, draft).await?;
        Ok(Response::new(proto::EditStockResponse {
            stock: Some(stock.into()),
        }))
    }

    async fn delete_stock(
        &self,
        request: Request<proto::DeleteStockRequest>,
    ) -> Result<Response<proto::DeleteStockResponse>, Status> {
        let id = self.service.delete(&request.into_inner().id).await?;
        Ok(Response::new(proto::DeleteStockResponse { id: id.to_string() }))
    }
}
