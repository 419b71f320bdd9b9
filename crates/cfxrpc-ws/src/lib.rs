//! cfxrpc-ws — WebSocket JSON-RPC transport.
//!
//! # Features
//! - Request multiplexing over a single connection
//! - Wire-level batching (one array frame per batch)
//! - Subscription management (`cfx_subscribe` / `cfx_unsubscribe`)
//!
//! A dropped connection is not re-established: pending calls fail and every
//! subscription feed ends.

pub mod client;
pub mod subscriptions;

pub use client::{WsClientConfig, WsTransport};
pub use subscriptions::{SubscriptionId, SubscriptionManager};
