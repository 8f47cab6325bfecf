//! Forwarding calls to the legacy HTTP backend.
//!
//! Every call becomes `POST {backend}?method={name}` with the raw request
//! bytes as an `application/octet-stream` body. A 200 response body is the
//! RPC response; every other outcome is an RPC error.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use tonic::{Code, Status};
use url::Url;

use crate::config::BackendConfig;
use crate::dispatch::MethodName;
use crate::proxy::status::code_for;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build backend client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Shared client for the legacy backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProxyExecutor {
    client: Client,
    backend: Url,
}

impl ProxyExecutor {
    pub fn new(config: &BackendConfig) -> Result<Self, ExecutorError> {
        let backend = Url::parse(&config.url)?;

        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .http1_only()
            .no_proxy();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        tracing::info!(
            backend = %backend,
            max_idle_connections = config.max_idle_connections,
            idle_timeout_secs = config.idle_timeout_secs,
            "Backend client ready"
        );

        Ok(Self {
            client: builder.build()?,
            backend,
        })
    }

    /// The URL a call to `method` is posted to.
    pub fn endpoint(&self, method: &MethodName) -> Url {
        let mut url = self.backend.clone();
        url.query_pairs_mut().append_pair("method", method.as_str());
        url
    }

    /// Forward one call and wait for its outcome.
    ///
    /// The HTTP exchange runs on its own task: if the caller stops waiting,
    /// the backend request still runs to completion and its result is
    /// discarded.
    pub async fn execute(&self, method: &MethodName, payload: Bytes) -> Result<Bytes, Status> {
        let request = self
            .client
            .post(self.endpoint(method))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(payload);
        let method = method.clone();

        match tokio::spawn(async move { round_trip(request, &method).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Backend call task failed");
                Err(Status::internal("backend call aborted"))
            }
        }
    }
}

async fn round_trip(request: RequestBuilder, method: &MethodName) -> Result<Bytes, Status> {
    let response = request.send().await.map_err(|e| {
        tracing::warn!(method = %method, error = %e, "Backend request failed");
        Status::internal(format!("backend request failed: {}", e))
    })?;

    let http_status = response.status();
    match code_for(http_status) {
        Code::Ok => response.bytes().await.map_err(|e| {
            tracing::warn!(method = %method, error = %e, "Failed to read backend response body");
            Status::internal(format!("failed to read backend response: {}", e))
        }),
        code => {
            tracing::debug!(
                method = %method,
                http_status = http_status.as_u16(),
                rpc_code = ?code,
                "Backend returned non-success status"
            );
            Err(Status::new(code, format!("backend responded with HTTP {}", http_status)))
        }
    }
}
