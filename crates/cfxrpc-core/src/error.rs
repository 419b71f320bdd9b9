//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, body read error).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// A single attempt exceeded the configured request timeout.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Every attempt allowed by the retry policy failed.
    #[error("rpc call timeout after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TransportError>,
    },

    /// The endpoint was closed before or while the call was in flight.
    #[error("transport closed")]
    Closed,

    /// The transport does not support the requested operation.
    #[error("unsupported by transport: {0}")]
    Unsupported(&'static str),

    /// Call arguments could not be serialized.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the node rejected the call (never retried).
    pub fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// The node-reported error, if this is one.
    pub fn as_rpc_error(&self) -> Option<&JsonRpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::RetriesExhausted { source, .. } => source.as_rpc_error(),
            _ => None,
        }
    }
}
