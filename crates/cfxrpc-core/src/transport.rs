//! The `RpcTransport` trait — the seam every endpoint implements.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A server-side subscription as opened by a transport: the id the node
/// assigned and the channel its push messages arrive on.
///
/// The channel closes when the connection drops or the transport is closed.
#[derive(Debug)]
pub struct SubscriptionStream {
    pub id: String,
    pub receiver: mpsc::UnboundedReceiver<Value>,
}

/// One connection to one node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests.
    ///
    /// Responses may come back in any order and may be incomplete; callers
    /// match them by id. The default sends requests one at a time; override
    /// for wire-level batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Open a push subscription with `cfx_subscribe(params…)`.
    async fn subscribe(&self, _params: Vec<Value>) -> Result<SubscriptionStream, TransportError> {
        Err(TransportError::Unsupported("subscriptions"))
    }

    /// Cancel a subscription with `cfx_unsubscribe(id)`.
    async fn unsubscribe(&self, _id: &str) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("subscriptions"))
    }

    /// Release the connection. Idempotent; in-flight and later calls fail
    /// with [`TransportError::Closed`].
    async fn close(&self);

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;
}
