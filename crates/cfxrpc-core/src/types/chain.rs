use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::quantity;
use super::Epoch;
use crate::address::Address;

/// Result of `cfx_getStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub best_hash: B256,
    #[serde(with = "quantity")]
    pub chain_id: u32,
    #[serde(with = "quantity")]
    pub network_id: u32,
    #[serde(with = "quantity")]
    pub epoch_number: u64,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub pending_tx_number: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub latest_checkpoint: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub latest_confirmed: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub latest_state: Option<u64>,
}

/// Result of `cfx_estimateGasAndCollateral`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub gas_limit: U256,
    pub gas_used: U256,
    pub storage_collateralized: U256,
}

/// An event emitted by contract execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_number: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_log_index: Option<U256>,
}

/// Argument of `cfx_getLogs` and of the `logs` subscription.
///
/// `topics[i]` lists the accepted values at position `i`; an empty inner list
/// matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_epoch: Option<Epoch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_epoch: Option<Epoch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_hashes: Vec<B256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Vec<B256>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "quantity::opt")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "quantity::opt")]
    pub limit: Option<u64>,
}

impl LogFilter {
    pub fn address(mut self, address: Address) -> Self {
        self.address.push(address);
        self
    }

    pub fn epochs(mut self, from: Epoch, to: Epoch) -> Self {
        self.from_epoch = Some(from);
        self.to_epoch = Some(to);
        self
    }

    /// Require `topic` at position `index`.
    pub fn topic(mut self, index: usize, topic: B256) -> Self {
        if self.topics.len() <= index {
            self.topics.resize(index + 1, Vec::new());
        }
        self.topics[index].push(topic);
        self
    }
}

/// Block header plus transaction hashes, as returned by the block queries
/// and pushed on the `newHeads` subscription (where `transactions` is empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: B256,
    pub parent_hash: B256,
    #[serde(default)]
    pub height: Option<U256>,
    pub miner: Address,
    #[serde(default)]
    pub epoch_number: Option<U256>,
    #[serde(default)]
    pub gas_limit: Option<U256>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub timestamp: Option<U256>,
    #[serde(default)]
    pub difficulty: Option<U256>,
    #[serde(default)]
    pub referee_hashes: Vec<B256>,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub transactions: Vec<B256>,
}

/// Pushed on the `epochs` subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochNotification {
    #[serde(with = "quantity")]
    pub epoch_number: u64,
    pub epoch_hashes_ordered: Vec<B256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_node_json() {
        let status: Status = serde_json::from_value(serde_json::json!({
            "bestHash": format!("0x{}", "ab".repeat(32)),
            "chainId": "0x1",
            "networkId": "0x1",
            "epochNumber": "0x2a",
            "blockNumber": "0x40",
            "pendingTxNumber": "0x0"
        }))
        .unwrap();
        assert_eq!(status.network_id, 1);
        assert_eq!(status.epoch_number, 42);
        assert_eq!(status.latest_state, None);
    }

    #[test]
    fn log_filter_serializes_only_set_fields() {
        let filter = LogFilter::default()
            .epochs(Epoch::Number(1), Epoch::LatestState)
            .topic(1, B256::repeat_byte(0x11));
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["fromEpoch"], "0x1");
        assert_eq!(json["toEpoch"], "latest_state");
        assert_eq!(json["topics"][0], serde_json::json!([]));
        assert!(json.get("address").is_none());
        assert!(json.get("limit").is_none());
    }

    #[test]
    fn epoch_notification_from_push() {
        let n: EpochNotification = serde_json::from_value(serde_json::json!({
            "epochNumber": "0x10",
            "epochHashesOrdered": [format!("0x{}", "01".repeat(32))]
        }))
        .unwrap();
        assert_eq!(n.epoch_number, 16);
        assert_eq!(n.epoch_hashes_ordered.len(), 1);
    }
}
