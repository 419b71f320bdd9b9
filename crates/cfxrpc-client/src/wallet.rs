//! Signing collaborator.
//!
//! Key storage, passphrases and the signature scheme live outside this crate;
//! the populator and contract facade only need the operations below.

use alloy_primitives::Bytes;
use async_trait::async_trait;
use thiserror::Error;

use cfxrpc_core::types::{SignedTransaction, UnsignedTransaction};
use cfxrpc_core::Address;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no account found")]
    NoAccountFound,
    #[error("account {0} is locked")]
    Locked(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Account used when a transaction names no sender.
    async fn default_address(&self) -> Result<Address, WalletError>;

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, WalletError>;

    /// Sign and produce the raw bytes accepted by `cfx_sendRawTransaction`.
    async fn sign_and_encode(&self, tx: &UnsignedTransaction) -> Result<Bytes, WalletError>;
}
