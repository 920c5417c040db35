//! Wire messages of the `stocks.v1` package, mirroring `proto/stocks.proto`.

use prost_types::Timestamp;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Stock {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub quantity: i64,
    #[prost(message, optional, tag = "4")]
    pub created_at: Option<Timestamp>,
    #[prost(message, optional, tag = "5")]
    pub updated_at: Option<Timestamp>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Pagination {
    #[prost(uint32, tag = "1")]
    pub page: u32,
    #[prost(uint32, tag = "2")]
    pub items_per_page: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStockRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStockResponse {
    #[prost(message, optional, tag = "1")]
    pub stock: Option<Stock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStocksRequest {
    #[prost(message, optional, tag = "1")]
    pub pagination: Option<Pagination>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStocksResponse {
    #[prost(message, repeated, tag = "1")]
    pub stocks: Vec<Stock>,
    #[prost(int64, tag = "2")]
    pub total_count: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateStockRequest {
    #[prost(message, optional, tag = "1")]
    pub stock: Option<Stock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateStockResponse {
    #[prost(message, optional, tag = "1")]
    pub stock: Option<Stock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EditStockRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub stock: Option<Stock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EditStockResponse {
    #[prost(message, optional, tag = "1")]
    pub stock: Option<Stock>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteStockRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteStockResponse {
    #[prost(string, tag = "1")]
    pub id: String,
}

include!(concat!(env!("OUT_DIR"), "/stocks.v1.StockService.rs"));
