//! Generates the StockService server and client stubs.
//!
//! Message types are hand-written prost structs in `src/rpc/proto.rs`
//! (mirroring `proto/stocks.proto`), so no protoc is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::proto::{}", input))
        .output_type(format!("crate::rpc::proto::{}", output))
        .codec_path(CODEC)
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/stocks.proto");

    let service = Service::builder()
        .name("StockService")
        .package("stocks.v1")
        .method(method("get_stock", "GetStock", "GetStockRequest", "GetStockResponse"))
        .method(method("list_stocks", "ListStocks", "ListStocksRequest", "ListStocksResponse"))
        .method(method("create_stock", "CreateStock", "CreateStockRequest", "CreateStockResponse"))
        .method(method("edit_stock", "EditStock", "EditStockRequest", "EditStockResponse"))
        .method(method("delete_stock", "DeleteStock", "DeleteStockRequest", "DeleteStockResponse"))
        .build();

    Builder::new().compile(&[service]);
}
