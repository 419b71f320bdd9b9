use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::chain::Log;
use super::quantity;
use crate::address::Address;

/// A transaction under construction.
///
/// Callers set any subset of fields; the populator in `cfxrpc-client` fills
/// the rest. Once populated, every field except `to` (absent for contract
/// creation) is `Some`, and `data` may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub nonce: Option<U256>,
    pub chain_id: Option<u32>,
    pub gas_price: Option<U256>,
    pub gas: Option<U256>,
    pub epoch_height: Option<u64>,
    pub storage_limit: Option<U256>,
    pub data: Bytes,
}

impl UnsignedTransaction {
    /// A plain value transfer.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value: Some(value),
            ..Default::default()
        }
    }

    /// True once every field a signer needs is present.
    pub fn is_populated(&self) -> bool {
        self.from.is_some()
            && self.value.is_some()
            && self.nonce.is_some()
            && self.chain_id.is_some()
            && self.gas_price.is_some()
            && self.gas.is_some()
            && self.epoch_height.is_some()
            && self.storage_limit.is_some()
    }
}

/// An unsigned transaction plus its signature; never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    v: u8,
    r: B256,
    s: B256,
}

impl SignedTransaction {
    pub fn new(unsigned: UnsignedTransaction, v: u8, r: B256, s: B256) -> Self {
        Self { unsigned, v, r, s }
    }

    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn signature(&self) -> (u8, B256, B256) {
        (self.v, self.r, self.s)
    }
}

/// Argument of `cfx_call` and `cfx_estimateGasAndCollateral`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<U256>,
}

impl CallRequest {
    /// Mirror every field the node uses for execution.
    pub fn from_transaction(tx: &UnsignedTransaction) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            gas_price: tx.gas_price,
            gas: tx.gas,
            value: tx.value,
            data: Some(tx.data.clone()),
            nonce: tx.nonce,
            storage_limit: tx.storage_limit,
        }
    }
}

/// A transaction as reported by `cfx_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,
    pub nonce: U256,
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default)]
    pub transaction_index: Option<U256>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: U256,
    pub gas: U256,
    #[serde(default)]
    pub contract_created: Option<Address>,
    pub data: Bytes,
    #[serde(default)]
    pub storage_limit: Option<U256>,
    #[serde(default, with = "quantity::opt")]
    pub epoch_height: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub chain_id: Option<u32>,
    /// `None` while pending, `0` executed, `1` failed, `2` skipped.
    #[serde(default, with = "quantity::opt")]
    pub status: Option<u64>,
    #[serde(default)]
    pub v: Option<U256>,
    #[serde(default)]
    pub r: Option<U256>,
    #[serde(default)]
    pub s: Option<U256>,
}

/// Execution outcome of a packed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub index: u64,
    pub block_hash: B256,
    #[serde(default, with = "quantity::opt")]
    pub epoch_number: Option<u64>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub gas_used: U256,
    #[serde(default)]
    pub gas_fee: Option<U256>,
    #[serde(default)]
    pub contract_created: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(default)]
    pub logs_bloom: Option<Bytes>,
    #[serde(default)]
    pub state_root: Option<B256>,
    #[serde(with = "quantity")]
    pub outcome_status: u64,
    #[serde(default)]
    pub tx_exec_error_msg: Option<String>,
    #[serde(default)]
    pub storage_collateralized: Option<U256>,
}

impl TransactionReceipt {
    pub const OUTCOME_SUCCESS: u64 = 0;

    pub fn is_success(&self) -> bool {
        self.outcome_status == Self::OUTCOME_SUCCESS
    }

    /// Node-reported failure reason, or a generic one built from the status.
    pub fn failure_message(&self) -> String {
        match &self.tx_exec_error_msg {
            Some(msg) if !msg.is_empty() => msg.clone(),
            _ => format!("transaction failed with outcome status {}", self.outcome_status),
        }
    }
}
