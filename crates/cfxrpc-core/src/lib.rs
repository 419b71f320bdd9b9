//! cfxrpc-core — foundation traits and types for cfxrpc.
//!
//! # Overview
//!
//! The core crate defines everything a Conflux JSON-RPC client needs below
//! the typed API:
//!
//! - [`RpcTransport`] — the async trait every endpoint implements
//! - [`RpcClient`] — retry, per-attempt timeout, middleware, batching and
//!   subscriptions over one transport
//! - [`normalize`] — address completion and argument marshalling
//! - [`Address`] — CIP-37 base32 addresses
//! - [`types`] — transactions, receipts, logs and node status
//! - [`TransportError`] — structured error type

pub mod address;
pub mod client;
pub mod error;
pub mod middleware;
pub mod normalize;
pub mod policy;
pub mod request;
pub mod subscription;
pub mod transport;
pub mod types;

pub use address::{Address, AddressError, AddressType};
pub use client::{ClientConfig, RpcClient};
pub use error::TransportError;
pub use middleware::{BatchHandler, CallHandler, LogBatchMiddleware, LogCallMiddleware};
pub use normalize::RpcParam;
pub use policy::{RetryConfig, RetryPolicy};
pub use request::{BatchElement, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use subscription::Subscription;
pub use transport::{RpcTransport, SubscriptionStream};
