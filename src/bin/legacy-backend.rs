//! Stand-in for a legacy HTTP/1.1 service.
//!
//! Answers `POST /grpc?method=...` for three methods:
//! - `helloworld.Greeter/SayHello`: protobuf `HelloRequest` in, `HelloReply` out
//! - `demo.Echo/Echo`: the request body, unchanged
//! - `demo.Echo/SlowEcho`: the same, after `--delay-ms`
//!
//! Every other method gets a 404, which the gateway reports as `UNIMPLEMENTED`.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use clap::Parser;
use prost::Message;
use tokio::net::TcpListener;

use rpc_gateway::config::ObservabilityConfig;
use rpc_gateway::lifecycle::{trigger_on_signal, Shutdown};
use rpc_gateway::observability::init_logging;

#[derive(Clone, PartialEq, prost::Message)]
struct HelloRequest {
    #[prost(string, tag = "1")]
    name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct HelloReply {
    #[prost(string, tag = "1")]
    message: String,
}

#[derive(Parser, Debug)]
#[command(name = "legacy-backend")]
#[command(about = "An HTTP/1.1 service implementing helloworld.Greeter its own way")]
struct Cli {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path the service is mounted at.
    #[arg(long, default_value = "/grpc")]
    path: String,

    /// Delay applied by `demo.Echo/SlowEcho`, in milliseconds.
    #[arg(long, default_value_t = 250)]
    delay_ms: u64,
}

async fn handle(
    State(delay): State<Duration>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    match params.get("method").map(String::as_str) {
        Some("helloworld.Greeter/SayHello") => say_hello(body),
        Some("demo.Echo/Echo") => octet_stream(body.to_vec()),
        Some("demo.Echo/SlowEcho") => {
            tokio::time::sleep(delay).await;
            octet_stream(body.to_vec())
        }
        other => {
            tracing::debug!(method = ?other, "Unknown method");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn say_hello(body: Bytes) -> Response {
    let request = match HelloRequest::decode(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed HelloRequest");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let reply = HelloReply {
        message: format!("Hello {}", request.name),
    };
    octet_stream(reply.encode_to_vec())
}

fn octet_stream(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig::default())?;

    let app = Router::new()
        .route(&cli.path, post(handle))
        .with_state(Duration::from_millis(cli.delay_ms));
    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(address = %listener.local_addr()?, path = %cli.path, "Legacy backend listening");

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    tokio::spawn(trigger_on_signal(shutdown));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop.recv().await;
        })
        .await?;
    Ok(())
}
