//! Stock endpoints
//!
//! | Method | Path    | Action |
//! |--------|---------|--------|
//! | GET    | `/`     | list, optional `{"pagination": {..}}` body or query |
//! | GET    | `/{id}` | fetch one |
//! | POST   | `/`     | create |
//! | POST   | `/{id}` | update |
//! | PUT    | `/{id}` | delete |

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Pagination, PaginationParams, Stock, StockDraft};

/// Optional body of `GET /`
#[derive(Debug, Default, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub pagination: Option<PaginationParams>,
}

/// Response of `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub stocks: Vec<Stock>,
    pub total_count: i64,
}

/// Body pagination wins over query parameters; neither means every row.
fn requested_pagination(
    query: PaginationParams,
    body: &[u8],
) -> Result<Option<Pagination>, ApiError> {
    if !body.iter().all(u8::is_ascii_whitespace) {
        let request: ListRequest = serde_json::from_slice(body).map_err(|e| ApiError::BadBody {
            message: format!("invalid list request body: {}", e),
        })?;
        if let Some(params) = request.pagination {
            return Ok(Some(params.into()));
        }
    }

    if query.page.is_some() || query.items_per_page.is_some() {
        return Ok(Some(query.into()));
    }
    Ok(None)
}

/// GET / - list stocks
async fn list_stocks(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PaginationParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(query) = query?;
    let pagination = requested_pagination(query, &body)?;
    let result = state.service.list(pagination).await?;

    Ok(Json(ListResponse {
        stocks: result.items,
        total_count: result.total_count,
    }))
}

/// GET /{id} - get a single stock
async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Stock>, ApiError> {
    Ok(Json(state.service.get(&id).await?))
}

/// POST / - create a stock
async fn create_stock(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StockDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Stock>), ApiError> {
    let Json(draft) = payload?;
    let stock = state.service.create(draft).await?;
    Ok((StatusCode::CREATED, Json(stock)))
}

/// POST /{id} - update a stock
async fn update_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<StockDraft>, JsonRejection>,
) -> Result<Json<Stock>, ApiError> {
    let Json(draft) = payload?;
    Ok(Json(state.service.update(&id, draft).await?))
}

/// PUT /{id} - delete a stock
async fn delete_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stock routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_stocks).post(create_stock))
        .route(
            "/{id}",
            get(get_stock).post(update_stock).put(delete_stock),
        )
}
