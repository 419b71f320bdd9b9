//! HTTP JSON-RPC transport backed by `reqwest`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use cfxrpc_core::error::TransportError;
use cfxrpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use cfxrpc_core::transport::RpcTransport;

/// Configuration for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// TCP connect timeout. Whole-request timeouts are enforced per attempt
    /// by the client.
    pub connect_timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            headers: Vec::new(),
        }
    }
}

/// HTTP endpoint for one node.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    closed: watch::Sender<bool>,
}

impl HttpTransport {
    /// Create a transport for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| TransportError::Http(format!("invalid url {url:?}: {e}")))?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Other(format!("invalid header name {name:?}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| TransportError::Other(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let (closed, _) = watch::channel(false);
        Ok(Self { url, http, closed })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpTransportConfig::default())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Run `fut` unless the transport is or becomes closed.
    async fn guarded<T, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            result = fut => result,
            _ = closed.wait_for(|c| *c) => Err(TransportError::Closed),
        }
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<R>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, id = %req.id, url = %self.url, "http send");
        self.guarded(self.post(&req)).await
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::trace!(size = reqs.len(), url = %self.url, "http batch");
        self.guarded(self.post(&reqs)).await
    }

    async fn close(&self) {
        if !self.closed.send_replace(true) {
            tracing::debug!(url = %self.url, "http transport closed");
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}
