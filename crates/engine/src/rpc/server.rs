// QDB - Contract Trace Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! RPC server implementation with async channel proxy pattern
//!
//! Axum handlers forward every request through a channel to a dispatcher
//! task, which runs each method on its own task so that a slow
//! `qdb_openSession` never blocks navigation of other sessions.

use super::methods::MethodHandler;
use super::types::{error_codes, RpcId, RpcRequest, RpcResponse};
use super::utils::{get_default_rpc_port, to_rpc_error};
use crate::{SessionManager, TraceProvider};
use axum::{
    extract::{rejection::JsonRejection, Json as JsonExtract, State},
    response::Json as JsonResponse,
    routing::{get, post},
    Router,
};
use eyre::Result;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Handle to the running RPC server
#[derive(Debug)]
pub struct RpcServerHandle {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Shutdown signal
    shutdown_tx: oneshot::Sender<()>,
}

impl RpcServerHandle {
    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gracefully shutdown the RPC server
    pub fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("RPC server already shut down");
        }
        Ok(())
    }
}

/// Thread-safe RPC state for Axum
#[derive(Clone)]
struct RpcState {
    /// Channel to send work to the dispatcher
    tx: mpsc::Sender<Work>,
}

/// Work item sent to the dispatcher
struct Work {
    /// The RPC request to handle
    req: RpcRequest,
    /// Channel to send back the response
    rsp: oneshot::Sender<RpcResponse>,
}

/// Debug RPC server over a session manager
#[derive(Debug)]
pub struct DebugRpcServer<P> {
    /// Method handler for RPC dispatch
    method_handler: Arc<MethodHandler<P>>,
}

impl<P: TraceProvider> DebugRpcServer<P> {
    /// Create a new debug RPC server
    pub fn new(manager: Arc<SessionManager<P>>) -> Self {
        Self { method_handler: Arc::new(MethodHandler::new(manager)) }
    }

    /// The session manager served by this server
    pub fn manager(&self) -> &Arc<SessionManager<P>> {
        self.method_handler.manager()
    }

    /// Start the RPC server on the default port
    pub async fn start(self) -> Result<RpcServerHandle> {
        let port = get_default_rpc_port()?;
        self.start_on_port(port).await
    }

    /// Spawn the dispatcher and build the Axum router in front of it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn into_router(self) -> Router {
        // 1) Channel between the Axum handlers and the dispatcher
        let (tx, mut rx) = mpsc::channel::<Work>(1024);

        // 2) Dispatcher: one task per request
        let handler = self.method_handler;
        tokio::spawn(async move {
            info!("Starting RPC dispatcher");

            while let Some(Work { req, rsp }) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let response = handle_request(&handler, req).await;

                    // Send response back (ignore if receiver dropped)
                    if rsp.send(response).is_err() {
                        warn!("Client dropped connection before response");
                    }
                });
            }

            info!("RPC dispatcher shutting down");
        });

        // 3) Axum app
        Router::new()
            .route("/", post(handle_rpc_request))
            .route("/health", get(health_check))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(RpcState { tx })
    }

    /// Start the RPC server on a specific port. Port `0` picks a free one.
    pub async fn start_on_port(self, port: u16) -> Result<RpcServerHandle> {
        let app = self.into_router();

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = served {
                error!("RPC server failed: {e}");
            }
        });

        info!("Debug RPC server started on {actual_addr}");

        Ok(RpcServerHandle { addr: actual_addr, shutdown_tx })
    }
}

/// Dispatch one request to its method
async fn handle_request<P: TraceProvider>(
    handler: &MethodHandler<P>,
    request: RpcRequest,
) -> RpcResponse {
    let id = request.id.clone();
    match handler.handle_method(&request.method, request.params).await {
        Ok(result) => RpcResponse::success(id, result),
        Err(error) => RpcResponse::failure(id, error),
    }
}

/// Handle RPC requests by forwarding them to the dispatcher
async fn handle_rpc_request(
    State(state): State<RpcState>,
    request: Result<JsonExtract<RpcRequest>, JsonRejection>,
) -> JsonResponse<RpcResponse> {
    let request = match request {
        Ok(JsonExtract(request)) => request,
        Err(rejection) => {
            return JsonResponse(RpcResponse::failure(
                RpcId::Null,
                to_rpc_error(
                    error_codes::PARSE_ERROR,
                    &format!("Parse error - {}", rejection.body_text()),
                    None,
                ),
            ));
        }
    };

    // Validate JSON-RPC version
    if request.jsonrpc != "2.0" {
        return JsonResponse(RpcResponse::failure(
            request.id,
            to_rpc_error(
                error_codes::INVALID_REQUEST,
                "Invalid Request - JSON-RPC version must be 2.0",
                None,
            ),
        ));
    }

    let (rsp_tx, rsp_rx) = oneshot::channel();
    let request_id = request.id.clone();
    if state.tx.send(Work { req: request, rsp: rsp_tx }).await.is_err() {
        error!("RPC dispatcher is dead");
        return JsonResponse(RpcResponse::failure(
            request_id,
            to_rpc_error(
                error_codes::INTERNAL_ERROR,
                "Internal error - dispatcher unavailable",
                None,
            ),
        ));
    }

    // Wait for response from the dispatcher
    let response = match rsp_rx.await {
        Ok(resp) => resp,
        Err(_) => {
            error!("Dispatcher dropped response channel");
            RpcResponse::failure(
                request_id,
                to_rpc_error(
                    error_codes::INTERNAL_ERROR,
                    "Internal error - dispatcher communication failed",
                    None,
                ),
            )
        }
    };

    JsonResponse(response)
}

/// Health check endpoint
async fn health_check() -> JsonResponse<serde_json::Value> {
    JsonResponse(serde_json::json!({
        "status": "healthy",
        "service": "qdb-debug-rpc-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Create and start a debug RPC server. Without a port, 3000 or the next free one is used.
pub async fn start_debug_server<P: TraceProvider>(
    manager: Arc<SessionManager<P>>,
    port: Option<u16>,
) -> Result<RpcServerHandle> {
    let server = DebugRpcServer::new(manager);
    match port {
        Some(port) => server.start_on_port(port).await,
        None => server.start().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::methods::tests::{counter_handler, TX};
    use qdb_common::ensure_test_logging;
    use serde_json::json;

    #[test]
    fn test_rpc_state_is_send_sync() {
        ensure_test_logging(None);
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RpcState>();
    }

    #[test]
    fn test_work_message_is_send() {
        ensure_test_logging(None);
        fn assert_send<T: Send>() {}
        assert_send::<Work>();
    }

    #[tokio::test]
    async fn test_handle_request_keeps_id() {
        ensure_test_logging(None);
        let handler = counter_handler();
        let request = RpcRequest {
            jsonrpc: "2.0".into(),
            method: "qdb_openSession".into(),
            params: Some(json!([TX])),
            id: RpcId::String("open".into()),
        };
        let response = handle_request(&handler, request).await;
        assert_eq!(response.id, RpcId::String("open".into()));
        assert_eq!(response.result, Some(json!(1)));
        assert!(response.error.is_none());
    }
}
