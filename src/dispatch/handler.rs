//! Per-call handler construction.
//!
//! [`MethodDispatcher::lookup`] never fails: every method name gets a
//! [`CallHandler`] bound to the shared executor and stats engine. The handler
//! runs tonic's framing with [`RawCodec`] and hands the raw request bytes to
//! [`ProxyExecutor::execute`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tonic::server::{ClientStreamingService, Grpc, UnaryService};
use tonic::{Status, Streaming};

use crate::config::{CallKind, DispatchConfig};
use crate::dispatch::codec::RawCodec;
use crate::dispatch::method::MethodName;
use crate::proxy::ProxyExecutor;
use crate::stats::{CallGuard, StatsEngine};

/// Produces a [`CallHandler`] for any method name.
#[derive(Debug, Clone)]
pub struct MethodDispatcher {
    executor: Arc<ProxyExecutor>,
    stats: Arc<StatsEngine>,
    call_kind: CallKind,
    max_message_bytes: usize,
}

impl MethodDispatcher {
    pub fn new(
        config: &DispatchConfig,
        executor: Arc<ProxyExecutor>,
        stats: Arc<StatsEngine>,
    ) -> Self {
        Self {
            executor,
            stats,
            call_kind: config.call_kind,
            max_message_bytes: config.max_message_bytes.unwrap_or(usize::MAX),
        }
    }

    /// Build a handler for `method`. There is no registry to miss.
    pub fn lookup(&self, method: MethodName) -> CallHandler {
        CallHandler {
            call: ProxyCall {
                method,
                executor: self.executor.clone(),
                stats: self.stats.clone(),
                max_message_bytes: self.max_message_bytes,
            },
            call_kind: self.call_kind,
        }
    }

}

/// Handles one call of one method.
#[derive(Debug, Clone)]
pub struct CallHandler {
    call: ProxyCall,
    call_kind: CallKind,
}

impl CallHandler {
    /// Serve one inbound call.
    ///
    /// The call is tracked from here until the response body is dropped, so
    /// the end is recorded exactly once whether the call succeeds, fails, or
    /// is abandoned by the client.
    pub async fn serve(
        self,
        request: axum::http::Request<Body>,
    ) -> axum::http::Response<TrackedBody> {
        let guard = self.call.stats.track(&self.call.method);
        let mut grpc = Grpc::new(RawCodec)
            .max_decoding_message_size(self.call.max_message_bytes)
            .max_encoding_message_size(usize::MAX);

        let response = match self.call_kind {
            CallKind::Unary => grpc.unary(self.call, request).await,
            CallKind::ClientStreaming => grpc.client_streaming(self.call, request).await,
        };
        response.map(|body| TrackedBody::new(Body::new(body), guard))
    }
}

#[derive(Debug, Clone)]
struct ProxyCall {
    method: MethodName,
    executor: Arc<ProxyExecutor>,
    stats: Arc<StatsEngine>,
    max_message_bytes: usize,
}

impl ProxyCall {
    async fn forward(self, payload: Bytes) -> Result<tonic::Response<Bytes>, Status> {
        self.stats.record_bytes_in(payload.len());
        let body = self.executor.execute(&self.method, payload).await?;
        self.stats.record_bytes_out(body.len());
        Ok(tonic::Response::new(body))
    }
}

impl UnaryService<Bytes> for ProxyCall {
    type Response = Bytes;
    type Future = BoxFuture<'static, Result<tonic::Response<Bytes>, Status>>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        let this = self.clone();
        Box::pin(this.forward(request.into_inner()))
    }
}

impl ClientStreamingService<Bytes> for ProxyCall {
    type Response = Bytes;
    type Future = BoxFuture<'static, Result<tonic::Response<Bytes>, Status>>;

    fn call(&mut self, request: tonic::Request<Streaming<Bytes>>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let mut stream = request.into_inner();
            let mut payload = BytesMut::new();
            while let Some(chunk) = stream.message().await? {
                if payload.len().saturating_add(chunk.len()) > this.max_message_bytes {
                    return Err(Status::resource_exhausted(format!(
                        "request stream exceeds {} bytes",
                        this.max_message_bytes
                    )));
                }
                payload.extend_from_slice(&chunk);
            }
            this.forward(payload.freeze()).await
        })
    }
}

/// Response body that ends the call's stats tracking when dropped.
pub struct TrackedBody {
    inner: Body,
    _guard: CallGuard,
}

impl TrackedBody {
    fn new(inner: Body, guard: CallGuard) -> Self {
        Self { inner, _guard: guard }
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
