//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Status;

use rpc_gateway::config::{CallKind, GatewayConfig, TlsConfig};
use rpc_gateway::dispatch::RawCodec;
use rpc_gateway::http::{GatewayServer, ServerError};
use rpc_gateway::lifecycle::Shutdown;
use rpc_gateway::stats::{LatencyBounds, StatsEngine};

/// One request as the legacy backend saw it.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub method: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

type Responder = Box<dyn Fn(BackendCall) -> BoxFuture<'static, (u16, Bytes)> + Send + Sync>;

struct BackendState {
    calls: Mutex<Vec<BackendCall>>,
    completed: AtomicUsize,
    respond: Responder,
}

/// A running mock of the legacy HTTP service, mounted at `/grpc`.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/grpc", self.addr)
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.calls.lock().clone()
    }

    /// Requests whose response has been fully produced.
    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::SeqCst)
    }
}

async fn backend_handler(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    let call = BackendCall {
        method: params.get("method").cloned(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };
    state.calls.lock().push(call.clone());
    let (status, body) = (state.respond)(call).await;
    state.completed.fetch_add(1, Ordering::SeqCst);
    (StatusCode::from_u16(status).unwrap(), body)
}

/// Start a mock backend whose responses come from `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(BackendCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Bytes)> + Send + 'static,
{
    let state = Arc::new(BackendState {
        calls: Mutex::new(Vec::new()),
        completed: AtomicUsize::new(0),
        respond: Box::new(move |call: BackendCall| -> BoxFuture<'static, (u16, Bytes)> {
            Box::pin(f(call))
        }),
    });
    let app = Router::new()
        .route("/grpc", post(backend_handler))
        .layer(DefaultBodyLimit::disable())
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockBackend { addr, state }
}

/// A backend that answers every call with its own request body.
pub async fn start_echo_backend() -> MockBackend {
    start_programmable_backend(|call| async move { (200, call.body) }).await
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub stats: Arc<StatsEngine>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestGateway {
    pub async fn channel(&self) -> Channel {
        Endpoint::from_shared(format!("http://{}", self.addr))
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    /// Connect over TLS. Connection and handshake failures are returned.
    pub async fn tls_channel(&self, tls: ClientTlsConfig) -> Result<Channel, tonic::transport::Error> {
        Endpoint::from_shared(format!("https://{}", self.addr))
            .unwrap()
            .tls_config(tls)?
            .connect()
            .await
    }
}

pub async fn start_gateway(backend_url: String, call_kind: CallKind) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.dispatch.call_kind = call_kind;
    start_gateway_with(backend_url, config).await
}

/// Start a gateway that requires mutual TLS with the given material.
pub async fn start_tls_gateway(backend_url: String, tls: TlsConfig) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.listener.tls = Some(tls);
    start_gateway_with(backend_url, config).await
}

async fn start_gateway_with(backend_url: String, mut config: GatewayConfig) -> TestGateway {
    config.backend.url = backend_url;
    config.backend.connect_timeout_secs = 2;

    let bounds = LatencyBounds::new(1, 30_000_000, 2).unwrap();
    let stats = Arc::new(StatsEngine::with_bounds(bounds, Duration::from_millis(10)));
    let server = GatewayServer::from_config(&config, stats.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        stats,
        shutdown,
        handle,
    }
}

fn path(method: &str) -> PathAndQuery {
    format!("/{}", method).parse().unwrap()
}

fn raw_client(channel: Channel) -> tonic::client::Grpc<Channel> {
    tonic::client::Grpc::new(channel)
        .max_decoding_message_size(usize::MAX)
        .max_encoding_message_size(usize::MAX)
}

/// Make a unary call with a raw request body.
pub async fn unary(channel: Channel, method: &str, payload: Bytes) -> Result<Bytes, Status> {
    let mut client = raw_client(channel);
    client
        .ready()
        .await
        .map_err(|e| Status::unavailable(e.to_string()))?;
    let response = client
        .unary(tonic::Request::new(payload), path(method), RawCodec)
        .await?;
    Ok(response.into_inner())
}

/// Make a client-streaming call sending `chunks` in order.
pub async fn client_streaming(
    channel: Channel,
    method: &str,
    chunks: Vec<Bytes>,
) -> Result<Bytes, Status> {
    let mut client = raw_client(channel);
    client
        .ready()
        .await
        .map_err(|e| Status::unavailable(e.to_string()))?;
    let stream = futures_util::stream::iter(chunks);
    let response = client
        .client_streaming(tonic::Request::new(stream), path(method), RawCodec)
        .await?;
    Ok(response.into_inner())
}

/// Stats accumulated across several drained reports.
#[derive(Debug, Default)]
pub struct Totals {
    pub calls: u64,
    pub methods: BTreeMap<String, u64>,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl Totals {
    fn absorb(&mut self, stats: &StatsEngine) {
        let report = stats.report();
        self.calls += report.all.count;
        self.bytes_in += report.bytes_in.total;
        self.bytes_out += report.bytes_out.total;
        for (method, snapshot) in report.methods {
            *self.methods.entry(method).or_default() += snapshot.count;
        }
    }
}

/// Drain `stats` until at least `expected` call ends have been recorded.
///
/// Call ends are recorded when the server drops the response body, which
/// can trail the client seeing the response.
pub async fn wait_for_calls(stats: &StatsEngine, expected: u64) -> Totals {
    let mut totals = Totals::default();
    for _ in 0..150 {
        totals.absorb(stats);
        if totals.calls >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    totals
}

/// A throwaway CA plus one leaf certificate for `localhost`, written as PEM
/// files into a fresh temp directory.
pub struct TestPki {
    pub tls: TlsConfig,
    pub ca_pem: String,
}

impl TestPki {
    pub fn generate(name: &str) -> Self {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::default();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "rpc-gateway test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf_params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let dir = std::env::temp_dir().join(format!(
            "rpc-gateway-pki-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let write = |file: &str, pem: String| {
            let path = dir.join(file);
            std::fs::write(&path, pem).unwrap();
            path.display().to_string()
        };

        let ca_pem = ca_cert.pem();
        let tls = TlsConfig {
            ca_cert_path: write("ca.pem", ca_pem.clone()),
            cert_path: write("cert.pem", leaf_cert.pem()),
            key_path: write("key.pem", leaf_key.serialize_pem()),
        };
        Self { tls, ca_pem }
    }
}
