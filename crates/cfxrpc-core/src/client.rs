//! `RpcClient` — retrying, middleware-extensible JSON-RPC caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::middleware::{BatchHandler, CallHandler};
use crate::normalize::{normalize, RpcParam};
use crate::policy::{RetryConfig, RetryPolicy};
use crate::request::{BatchElement, JsonRpcRequest};
use crate::subscription::Subscription;
use crate::transport::RpcTransport;
use crate::types::quantity;

/// Default bound on a single attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub retry: RetryConfig,
    /// Bound on each attempt. Zero restores [`DEFAULT_REQUEST_TIMEOUT`].
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn effective_timeout(&self) -> Duration {
        if self.request_timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            self.request_timeout
        }
    }
}

/// Client for one node.
///
/// The network id is fetched once while connecting and stamped onto every
/// address argument from then on. Middleware is installed through `&mut self`,
/// so the chain is fixed by the time the client is shared behind an `Arc`.
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    network_id: u32,
    call_handler: Arc<dyn CallHandler>,
    batch_handler: Arc<dyn BatchHandler>,
}

impl RpcClient {
    /// Connect over `transport`, resolving the network id with `cfx_getStatus`.
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        config: ClientConfig,
    ) -> Result<Self, TransportError> {
        #[derive(Deserialize)]
        struct NetworkOnly {
            #[serde(rename = "networkId", with = "quantity")]
            network_id: u32,
        }

        let probe = TransportHandler::new(transport.clone(), &config, 0);
        let status = CallHandler::handle(&probe, "cfx_getStatus", &[]).await?;
        let NetworkOnly { network_id } = serde_json::from_value(status)?;
        tracing::debug!(url = %transport.url(), network_id, "connected");

        Ok(Self::with_network_id(transport, config, network_id))
    }

    /// Build a client for a known network id without contacting the node.
    pub fn with_network_id(
        transport: Arc<dyn RpcTransport>,
        config: ClientConfig,
        network_id: u32,
    ) -> Self {
        let base = Arc::new(TransportHandler::new(transport.clone(), &config, network_id));
        Self {
            transport,
            network_id,
            call_handler: base.clone(),
            batch_handler: base,
        }
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Call `method` and decode its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[RpcParam],
    ) -> Result<T, TransportError> {
        let value = self.call_handler.handle(method, params).await?;
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }

    /// Send `elements` as one wire-level batch.
    ///
    /// On `Ok`, every element holds either a result or its own error.
    pub async fn batch_call(&self, elements: &mut [BatchElement]) -> Result<(), TransportError> {
        self.batch_handler.handle(elements).await
    }

    /// Open a `cfx_subscribe(topic, params…)` feed. Not retried.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        topic: &str,
        params: &[RpcParam],
    ) -> Result<Subscription<T>, TransportError> {
        let mut wire = vec![Value::String(topic.to_string())];
        wire.extend(normalize(params, self.network_id)?);
        let stream = self.transport.subscribe(wire).await?;
        tracing::debug!(topic, id = %stream.id, "subscribed");
        Ok(Subscription::new(self.transport.clone(), stream))
    }

    /// Wrap the current call handler; the newest middleware runs first.
    pub fn use_call_middleware<F>(&mut self, middleware: F)
    where
        F: FnOnce(Arc<dyn CallHandler>) -> Arc<dyn CallHandler>,
    {
        self.call_handler = middleware(self.call_handler.clone());
    }

    /// Wrap the current batch handler; the newest middleware runs first.
    pub fn use_batch_middleware<F>(&mut self, middleware: F)
    where
        F: FnOnce(Arc<dyn BatchHandler>) -> Arc<dyn BatchHandler>,
    {
        self.batch_handler = middleware(self.batch_handler.clone());
    }

    /// Close the underlying transport. Idempotent.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}

/// Innermost handler: normalizes arguments, then sends with retry and a
/// per-attempt timeout.
struct TransportHandler {
    transport: Arc<dyn RpcTransport>,
    retry: RetryPolicy,
    timeout: Duration,
    network_id: u32,
    next_id: AtomicU64,
}

impl TransportHandler {
    fn new(transport: Arc<dyn RpcTransport>, config: &ClientConfig, network_id: u32) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(config.retry.clone()),
            timeout: config.effective_timeout(),
            network_id,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout {
            ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl CallHandler for TransportHandler {
    async fn handle(&self, method: &str, params: &[RpcParam]) -> Result<Value, TransportError> {
        let wire = &normalize(params, self.network_id)?;
        self.retry
            .run(method, move || async move {
                let req = JsonRpcRequest::new(self.next_id(), method, wire.clone());
                let resp = tokio::time::timeout(self.timeout, self.transport.send(req))
                    .await
                    .map_err(|_| self.timeout_error())??;
                resp.into_result().map_err(TransportError::Rpc)
            })
            .await
    }
}

#[async_trait]
impl BatchHandler for TransportHandler {
    async fn handle(&self, elements: &mut [BatchElement]) -> Result<(), TransportError> {
        if elements.is_empty() {
            return Ok(());
        }
        let wire = elements
            .iter()
            .map(|e| normalize(&e.params, self.network_id))
            .collect::<Result<Vec<_>, _>>()?;

        let pending: &[BatchElement] = elements;
        let wire = &wire;
        let (ids, responses) = self
            .retry
            .run("batch", move || async move {
                let reqs: Vec<JsonRpcRequest> = pending
                    .iter()
                    .zip(wire)
                    .map(|(e, params)| JsonRpcRequest::new(self.next_id(), &e.method, params.clone()))
                    .collect();
                let ids: Vec<u64> = reqs.iter().filter_map(|r| r.id.as_u64()).collect();
                let responses = tokio::time::timeout(self.timeout, self.transport.send_batch(reqs))
                    .await
                    .map_err(|_| self.timeout_error())??;
                Ok((ids, responses))
            })
            .await?;

        let mut by_id: HashMap<u64, _> = responses
            .into_iter()
            .filter_map(|r| r.id.as_u64().map(|id| (id, r)))
            .collect();
        for (element, id) in elements.iter_mut().zip(ids) {
            match by_id.remove(&id) {
                Some(resp) => element.fill(resp),
                None => element.fill_missing(),
            }
        }
        Ok(())
    }
}
