//! Errors of the typed client, populator, tracker and contract facade.

use std::time::Duration;

use alloy_primitives::B256;
use thiserror::Error;

use cfxrpc_core::types::TransactionReceipt;
use cfxrpc_core::TransportError;

use crate::wallet::WalletError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// An RPC failed; `method` names the node method.
    #[error("rpc request {method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: TransportError,
    },

    /// A transaction field could not be resolved from the node.
    #[error("failed to resolve {field}: {source}")]
    Population {
        field: &'static str,
        #[source]
        source: Box<ClientError>,
    },

    #[error("transaction has no sender and the wallet has no default account")]
    MissingFromAddress,

    #[error("no account found in wallet")]
    NoAccountFound,

    #[error("wallet error: {0}")]
    Wallet(#[source] WalletError),

    #[error("ABI encoding failed: {0}")]
    Encoding(String),

    #[error("ABI decoding failed: {0}")]
    Decoding(String),

    /// `cfx_call` returned no bytes, usually because no contract lives at the
    /// target address.
    #[error("call returned empty response")]
    EmptyResponse,

    #[error("transaction {hash} not confirmed within {timeout:?}")]
    DeploymentTimeout { hash: B256, timeout: Duration },

    #[error("transaction {hash} failed on chain: {message}")]
    ExecutionFailed {
        hash: B256,
        message: String,
        receipt: Box<TransactionReceipt>,
    },

    #[error("receipt has no created contract address")]
    MissingContractAddress,

    /// The task producing a result went away before reporting it.
    #[error("operation cancelled before completion")]
    Cancelled,
}

impl ClientError {
    pub(crate) fn transport(method: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Transport { method, source }
    }

    pub(crate) fn population(field: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Population {
            field,
            source: Box::new(source),
        }
    }

    /// Pipeline stage the error came from.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Transport { .. } | Self::EmptyResponse => "transport",
            Self::Population { .. } | Self::MissingFromAddress => "population",
            Self::NoAccountFound | Self::Wallet(_) => "signing",
            Self::Encoding(_) | Self::Decoding(_) => "codec",
            Self::DeploymentTimeout { .. }
            | Self::ExecutionFailed { .. }
            | Self::MissingContractAddress
            | Self::Cancelled => "confirmation",
        }
    }

    /// The transport failure at the root of this error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::Population { source, .. } => source.transport_error(),
            _ => None,
        }
    }
}

impl From<WalletError> for ClientError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::NoAccountFound => Self::NoAccountFound,
            other => Self::Wallet(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_keeps_field_and_cause() {
        let err = ClientError::population("nonce")(ClientError::transport("cfx_getNextNonce")(
            TransportError::Http("connection refused".into()),
        ));
        assert_eq!(err.stage(), "population");
        assert!(err.to_string().contains("nonce"));
        assert!(matches!(err.transport_error(), Some(TransportError::Http(_))));
    }

    #[test]
    fn wallet_no_account_maps_to_dedicated_variant() {
        let err: ClientError = WalletError::NoAccountFound.into();
        assert!(matches!(err, ClientError::NoAccountFound));
        assert_eq!(err.stage(), "signing");
    }
}
