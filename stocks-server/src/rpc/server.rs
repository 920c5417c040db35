//! tonic server setup

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use super::proto::stock_service_server::StockServiceServer;
use super::service::StockRpc;
use crate::service::StockService;

/// Run the RPC accept loop on an already bound listener.
pub async fn serve_rpc(
    listener: TcpListener,
    service: StockService,
    request_timeout: Duration,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "gRPC server listening");
    }

    Server::builder()
        .timeout(request_timeout)
        .layer(TraceLayer::new_for_grpc())
        .add_service(StockServiceServer::new(StockRpc::new(service)))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
}
