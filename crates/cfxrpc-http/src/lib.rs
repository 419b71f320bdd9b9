//! cfxrpc-http — HTTP JSON-RPC transport.
//!
//! One `POST` per call, one `POST` with a JSON array per batch. Retry and
//! timeouts are applied above the transport by
//! [`RpcClient`](cfxrpc_core::RpcClient).

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
