//! cfxrpc-client — typed Conflux API on top of `cfxrpc-core`.
//!
//! - [`CfxClient`] — `cfx_*` methods with typed arguments and results
//! - [`SigningClient`] — transaction population, signing and submission
//! - [`ConfirmationTracker`] — receipt polling with a deadline
//! - [`Contract`] — ABI-aware calls, transactions, deployment and event decoding
//! - [`ContractRegistry`] — caller-owned cache of contract bindings
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cfxrpc_client::CfxClient;
//! use cfxrpc_core::ClientConfig;
//! use cfxrpc_http::HttpTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::default_for("https://test.confluxrpc.com")?);
//! let cfx = CfxClient::connect(transport, ClientConfig::default()).await?;
//! let epoch = cfx.epoch_number(None).await?;
//! println!("network {} at epoch {epoch}", cfx.network_id());
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod cfx;
pub mod contract;
pub mod error;
pub mod populator;
pub mod registry;
pub mod tracker;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use abi::{address_value, AbiCodec, JsonAbiCodec};
pub use cfx::CfxClient;
pub use contract::{CallOptions, Contract, DeploymentResult, PendingDeployment, TxOptions};
pub use error::ClientError;
pub use populator::{storage_limit_with_margin, SigningClient, DEFAULT_GAS, MIN_GAS_PRICE};
pub use registry::{ContractRegistry, InternalContract};
pub use tracker::{ConfirmationTracker, Outcome, PendingConfirmation, TrackerConfig};
pub use wallet::{Wallet, WalletError};
