//! Call and batch handler chains.
//!
//! [`RpcClient`](crate::client::RpcClient) sends every call through a
//! [`CallHandler`] and every batch through a [`BatchHandler`]. A middleware is
//! a function from the current handler to a new one that decorates it;
//! installing one replaces the chain's head, so the last middleware installed
//! runs first. A middleware that never calls its inner handler suppresses the
//! RPC entirely.
//!
//! Handlers see the caller's arguments as given; address completion and
//! serialization happen in the innermost handler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::normalize::RpcParam;
use crate::request::BatchElement;

#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn handle(&self, method: &str, params: &[RpcParam]) -> Result<Value, TransportError>;
}

#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Only transport-level failures are returned; per-call errors land in
    /// the elements.
    async fn handle(&self, elements: &mut [BatchElement]) -> Result<(), TransportError>;
}

/// Logs every call with its duration at `debug`, failures at `warn`.
pub struct LogCallMiddleware {
    inner: Arc<dyn CallHandler>,
}

impl LogCallMiddleware {
    pub fn wrap(inner: Arc<dyn CallHandler>) -> Arc<dyn CallHandler> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl CallHandler for LogCallMiddleware {
    async fn handle(&self, method: &str, params: &[RpcParam]) -> Result<Value, TransportError> {
        let start = Instant::now();
        let result = self.inner.handle(method, params).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(value) => tracing::debug!(
                method,
                params = ?params,
                result = %value,
                elapsed_ms,
                "rpc call"
            ),
            Err(e) => tracing::warn!(
                method,
                params = ?params,
                error = %e,
                elapsed_ms,
                "rpc call failed"
            ),
        }
        result
    }
}

/// Batch counterpart of [`LogCallMiddleware`].
pub struct LogBatchMiddleware {
    inner: Arc<dyn BatchHandler>,
}

impl LogBatchMiddleware {
    pub fn wrap(inner: Arc<dyn BatchHandler>) -> Arc<dyn BatchHandler> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl BatchHandler for LogBatchMiddleware {
    async fn handle(&self, elements: &mut [BatchElement]) -> Result<(), TransportError> {
        let start = Instant::now();
        let result = self.inner.handle(elements).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let methods: Vec<&str> = elements.iter().map(|e| e.method.as_str()).collect();
        match &result {
            Ok(()) => {
                let failed = elements.iter().filter(|e| e.error.is_some()).count();
                tracing::debug!(?methods, failed, elapsed_ms, "rpc batch");
            }
            Err(e) => tracing::warn!(?methods, error = %e, elapsed_ms, "rpc batch failed"),
        }
        result
    }
}
