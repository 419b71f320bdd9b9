//! Reliability policies applied by [`RpcClient`](crate::client::RpcClient).
//!
//! ```text
//! call → [middleware chain] → [RetryPolicy] → [per-attempt timeout] → [Transport]
//! ```

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
