//! Gateway server setup.
//!
//! # Responsibilities
//! - Build the Axum router: every path falls through to the dispatcher
//! - Serve plaintext HTTP/2 (h2c) or mutual TLS
//! - Drain in-flight calls on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::dispatch::{MethodDispatcher, MethodName};
use crate::net::{SecureTransportContext, TlsError};
use crate::proxy::{ExecutorError, ProxyExecutor};
use crate::stats::StatsEngine;

/// How long TLS connections get to finish after shutdown fires.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
}

#[derive(Clone)]
struct AppState {
    dispatcher: MethodDispatcher,
}

/// The RPC gateway server.
pub struct GatewayServer {
    router: Router,
    tls: Option<RustlsConfig>,
}

impl GatewayServer {
    /// Plaintext server in front of `dispatcher`.
    pub fn new(dispatcher: MethodDispatcher) -> Self {
        Self {
            router: Self::build_router(AppState { dispatcher }),
            tls: None,
        }
    }

    /// Require mutual TLS on every connection.
    pub fn with_tls(mut self, tls: RustlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Wire the executor, dispatcher and optional TLS from configuration.
    pub fn from_config(
        config: &GatewayConfig,
        stats: Arc<StatsEngine>,
    ) -> Result<Self, ServerError> {
        let executor = Arc::new(ProxyExecutor::new(&config.backend)?);
        let dispatcher = MethodDispatcher::new(&config.dispatch, executor, stats);
        let server = Self::new(dispatcher);

        match &config.listener.tls {
            Some(tls) => {
                let context = SecureTransportContext::load(tls)?;
                Ok(server.with_tls(context.rustls_config()?))
            }
            None => {
                tracing::warn!("No [listener.tls] configured, serving plaintext HTTP/2");
                Ok(server)
            }
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_call)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = self.is_tls(), "Gateway server starting");

        match self.tls {
            Some(tls) => {
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Gateway server received shutdown signal, draining");
                    drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, tls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Gateway server received shutdown signal, draining");
                    })
                    .await?;
            }
        }

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Every inbound request lands here, whatever its path.
async fn dispatch_call(State(state): State<AppState>, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "RPC calls must use POST").into_response();
    }

    let Some(method) = MethodName::from_path(request.uri().path()) else {
        tracing::debug!(path = %request.uri().path(), "Request path names no method");
        return unimplemented();
    };

    tracing::debug!(method = %method, "Dispatching call");
    let handler = state.dispatcher.lookup(method);
    handler.serve(request).await.map(Body::new)
}

/// A trailers-only gRPC response with status `UNIMPLEMENTED`.
fn unimplemented() -> Response {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    headers.insert("grpc-status", HeaderValue::from(tonic::Code::Unimplemented as i32));
    headers.insert("grpc-message", HeaderValue::from_static("no method in request path"));
    response
}
