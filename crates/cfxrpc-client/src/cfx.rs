//! Typed wrappers over the `cfx_*` RPC namespace.

use std::sync::Arc;

use alloy_primitives::{Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use cfxrpc_core::types::{
    quantity, BlockSummary, CallRequest, Epoch, EpochNotification, Estimate, Log, LogFilter,
    Status, Transaction, TransactionReceipt,
};
use cfxrpc_core::{Address, ClientConfig, RpcClient, RpcParam, RpcTransport, Subscription};

use crate::error::ClientError;

#[derive(Deserialize)]
#[serde(transparent)]
struct Quantity(#[serde(with = "quantity")] u64);

/// Conflux node API over an [`RpcClient`].
///
/// Every failure is reported as [`ClientError::Transport`] carrying the node
/// method that failed.
pub struct CfxClient {
    rpc: RpcClient,
}

impl CfxClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Connect and resolve the network id before returning.
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        RpcClient::connect(transport, config)
            .await
            .map(Self::new)
            .map_err(ClientError::transport("cfx_getStatus"))
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn network_id(&self) -> u32 {
        self.rpc.network_id()
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &[RpcParam],
    ) -> Result<T, ClientError> {
        self.rpc
            .call(method, params)
            .await
            .map_err(ClientError::transport(method))
    }

    pub async fn status(&self) -> Result<Status, ClientError> {
        self.request("cfx_getStatus", &[]).await
    }

    pub async fn client_version(&self) -> Result<String, ClientError> {
        self.request("cfx_clientVersion", &[]).await
    }

    pub async fn gas_price(&self) -> Result<U256, ClientError> {
        self.request("cfx_gasPrice", &[]).await
    }

    pub async fn next_nonce(
        &self,
        address: Address,
        epoch: Option<Epoch>,
    ) -> Result<U256, ClientError> {
        self.request("cfx_getNextNonce", &[address.into(), epoch.into()])
            .await
    }

    /// Epoch number at `epoch`, or at `latest_mined` when `None`.
    pub async fn epoch_number(&self, epoch: Option<Epoch>) -> Result<u64, ClientError> {
        let Quantity(n) = self.request("cfx_epochNumber", &[epoch.into()]).await?;
        Ok(n)
    }

    pub async fn balance(&self, address: Address, epoch: Option<Epoch>) -> Result<U256, ClientError> {
        self.request("cfx_getBalance", &[address.into(), epoch.into()])
            .await
    }

    pub async fn code(&self, address: Address, epoch: Option<Epoch>) -> Result<Bytes, ClientError> {
        self.request("cfx_getCode", &[address.into(), epoch.into()])
            .await
    }

    /// Block summary (transaction hashes only).
    pub async fn block_by_hash(&self, hash: B256) -> Result<Option<BlockSummary>, ClientError> {
        self.request("cfx_getBlockByHash", &[hash.into(), false.into()])
            .await
    }

    /// Pivot block summary of `epoch`.
    pub async fn block_by_epoch(&self, epoch: Epoch) -> Result<Option<BlockSummary>, ClientError> {
        self.request("cfx_getBlockByEpochNumber", &[epoch.into(), false.into()])
            .await
    }

    pub async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>, ClientError> {
        self.request("cfx_getTransactionByHash", &[hash.into()])
            .await
    }

    /// `None` until the transaction has been executed.
    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        self.request("cfx_getTransactionReceipt", &[hash.into()])
            .await
    }

    pub async fn logs(&self, filter: LogFilter) -> Result<Vec<Log>, ClientError> {
        self.request("cfx_getLogs", &[filter.into()]).await
    }

    /// Submit signed, RLP-encoded transaction bytes.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ClientError> {
        self.request("cfx_sendRawTransaction", &[raw.into()]).await
    }

    /// Execute `request` without creating a transaction.
    /// Execute `request` without a transaction. Output that is not
    /// `0x`-prefixed hex is a [`ClientError::Decoding`].
    pub async fn call(
        &self,
        request: CallRequest,
        epoch: Option<Epoch>,
    ) -> Result<Bytes, ClientError> {
        let raw: String = self
            .request("cfx_call", &[request.into(), epoch.into()])
            .await?;
        decode_call_output(&raw)
    }

    pub async fn estimate_gas_and_collateral(
        &self,
        request: CallRequest,
        epoch: Option<Epoch>,
    ) -> Result<Estimate, ClientError> {
        self.request("cfx_estimateGasAndCollateral", &[request.into(), epoch.into()])
            .await
    }

    async fn subscribe<T: DeserializeOwned>(
        &self,
        topic: &str,
        params: &[RpcParam],
    ) -> Result<Subscription<T>, ClientError> {
        self.rpc
            .subscribe(topic, params)
            .await
            .map_err(ClientError::transport("cfx_subscribe"))
    }

    pub async fn subscribe_new_heads(&self) -> Result<Subscription<BlockSummary>, ClientError> {
        self.subscribe("newHeads", &[]).await
    }

    pub async fn subscribe_epochs(&self) -> Result<Subscription<EpochNotification>, ClientError> {
        self.subscribe("epochs", &[]).await
    }

    pub async fn subscribe_logs(&self, filter: LogFilter) -> Result<Subscription<Log>, ClientError> {
        self.subscribe("logs", &[filter.into()]).await
    }

    pub async fn close(&self) {
        self.rpc.close().await;
    }
}

fn decode_call_output(raw: &str) -> Result<Bytes, ClientError> {
    if raw.len() < 2 {
        return Err(ClientError::EmptyResponse);
    }
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ClientError::Decoding(format!("call output {raw:?} is not 0x-prefixed")))?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| ClientError::Decoding(format!("call output {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cfx_client, MockNode};
    use cfxrpc_core::TransportError;
    use serde_json::json;

    #[tokio::test]
    async fn epoch_number_parses_hex_quantity() {
        let node = MockNode::new();
        node.on("cfx_epochNumber", json!("0x3e8"));
        let cfx = cfx_client(&node);

        assert_eq!(cfx.epoch_number(Some(Epoch::LatestState)).await.unwrap(), 1000);
        assert_eq!(node.params("cfx_epochNumber")[0], vec![json!("latest_state")]);
    }

    #[tokio::test]
    async fn missing_epoch_is_not_sent() {
        let node = MockNode::new();
        node.on("cfx_getBalance", json!("0x10"));
        let cfx = cfx_client(&node);
        let addr = Address::from_hex("0x1a2f80341409639ea6a35bbcab8299066109aa55").unwrap();

        assert_eq!(cfx.balance(addr, None).await.unwrap(), U256::from(16u64));
        assert_eq!(
            node.params("cfx_getBalance")[0],
            vec![json!("cfxtest:aarc9abycue0hhzgyrr53m6cxedgccrmmy8m50bu1p")]
        );
    }

    #[tokio::test]
    async fn pending_receipt_is_none() {
        let node = MockNode::new();
        node.on("cfx_getTransactionReceipt", serde_json::Value::Null);
        let cfx = cfx_client(&node);
        assert!(cfx.transaction_receipt(B256::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn errors_name_the_method() {
        let node = MockNode::new();
        let cfx = cfx_client(&node);
        let err = cfx.gas_price().await.unwrap_err();
        match err {
            ClientError::Transport { method, source } => {
                assert_eq!(method, "cfx_gasPrice");
                assert!(matches!(source, TransportError::Rpc(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_output_must_be_hex() {
        let node = MockNode::new();
        let cfx = cfx_client(&node);

        node.on("cfx_call", json!("0x0102"));
        let out = cfx.call(CallRequest::default(), None).await.unwrap();
        assert_eq!(out.as_ref(), &[0x01, 0x02]);

        node.on("cfx_call", json!("0xzz"));
        let err = cfx.call(CallRequest::default(), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Decoding(_)));
        assert_eq!(err.stage(), "codec");

        node.on("cfx_call", json!(""));
        let err = cfx.call(CallRequest::default(), None).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyResponse));
    }
}
