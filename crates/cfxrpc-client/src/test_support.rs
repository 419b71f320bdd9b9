//! Scripted node and wallet shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use serde_json::{json, Value};

use cfxrpc_core::address::TESTNET_ID;
use cfxrpc_core::types::{SignedTransaction, UnsignedTransaction};
use cfxrpc_core::{
    Address, ClientConfig, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcClient,
    RpcTransport, TransportError,
};

use crate::cfx::CfxClient;
use crate::wallet::{Wallet, WalletError};

/// ERC-20 style fixture: constructor, reads, a transfer and its event.
pub(crate) const TOKEN_ABI: &str = r#"[
    {"type":"constructor","inputs":[{"name":"supply","type":"uint256"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"name","inputs":[],"outputs":[{"name":"","type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
    {"type":"event","name":"Transfer","anonymous":false,"inputs":[
        {"name":"from","type":"address","indexed":true},
        {"name":"to","type":"address","indexed":true},
        {"name":"value","type":"uint256","indexed":false}
    ]}
]"#;

type Handler = Box<dyn FnMut(&[Value]) -> Result<Value, TransportError> + Send>;

/// Node whose answers are scripted per method. Unscripted methods are
/// rejected with `-32601`.
#[derive(Default)]
pub(crate) struct MockNode {
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: &str, value: Value) {
        self.on_fn(method, move |_| Ok(value.clone()));
    }

    pub fn on_fn<F>(&self, method: &str, handler: F)
    where
        F: FnMut(&[Value]) -> Result<Value, TransportError> + Send + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), Box::new(handler));
    }

    /// Methods received, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Parameters of every call to `method`, in order.
    pub fn params(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.params(method).len()
    }
}

#[async_trait]
impl RpcTransport for MockNode {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((req.method.clone(), req.params.clone()));
        let answer = match self.handlers.lock().unwrap().get_mut(&req.method) {
            Some(handler) => handler(&req.params),
            None => Err(TransportError::Rpc(JsonRpcError {
                code: -32601,
                message: format!("method {} not found", req.method),
                data: None,
            })),
        };
        match answer {
            Ok(value) => Ok(JsonRpcResponse::success(req.id, value)),
            Err(TransportError::Rpc(err)) => Ok(JsonRpcResponse::failure(req.id, err)),
            Err(other) => Err(other),
        }
    }

    async fn close(&self) {}

    fn url(&self) -> &str {
        "mock://node"
    }
}

pub(crate) fn cfx_client(node: &Arc<MockNode>) -> CfxClient {
    CfxClient::new(RpcClient::with_network_id(
        node.clone(),
        ClientConfig::default(),
        TESTNET_ID,
    ))
}

pub(crate) fn sender() -> Address {
    Address::from_hex("0x1a2f80341409639ea6a35bbcab8299066109aa55").unwrap()
}

pub(crate) fn receiver() -> Address {
    Address::from_hex("0x85d80245dc02f5a89589e1f19c5c718e405b56cd").unwrap()
}

/// Node answering every request the populator and `cfx_sendRawTransaction`
/// make.
pub(crate) fn populating_node(gas_price: &str) -> Arc<MockNode> {
    let node = MockNode::new();
    node.on("cfx_getNextNonce", json!("0x7"));
    node.on("cfx_getStatus", json!({
        "bestHash": B256::ZERO,
        "chainId": "0x1",
        "networkId": "0x1",
        "epochNumber": "0x64",
    }));
    node.on("cfx_gasPrice", json!(gas_price));
    node.on("cfx_epochNumber", json!("0x64"));
    node.on("cfx_estimateGasAndCollateral", json!({
        "gasLimit": "0x6000",
        "gasUsed": "0x5208",
        "storageCollateralized": "0x40",
    }));
    node.on("cfx_sendRawTransaction", json!(B256::repeat_byte(0xab)));
    node
}

/// Receipt as a node would report it.
pub(crate) fn receipt_json(hash: B256, outcome_status: u64, created: Option<Address>) -> Value {
    json!({
        "transactionHash": hash,
        "index": "0x0",
        "blockHash": B256::repeat_byte(0x22),
        "epochNumber": "0x10",
        "from": sender().with_network_id(TESTNET_ID),
        "to": Value::Null,
        "gasUsed": "0x5208",
        "contractCreated": created.map(|a| a.with_network_id(TESTNET_ID)),
        "logs": [],
        "outcomeStatus": format!("{outcome_status:#x}"),
        "txExecErrorMsg": if outcome_status == 0 { Value::Null } else { json!("Vm reverted") },
    })
}

/// Wallet that signs with a zero signature and records what it signed.
#[derive(Default)]
pub(crate) struct MockWallet {
    account: Option<Address>,
    signed: Mutex<Vec<UnsignedTransaction>>,
}

impl MockWallet {
    pub fn with_account(account: Address) -> Arc<Self> {
        Arc::new(Self {
            account: Some(account),
            ..Default::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed(&self) -> Vec<UnsignedTransaction> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn default_address(&self) -> Result<Address, WalletError> {
        self.account.ok_or(WalletError::NoAccountFound)
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, WalletError> {
        self.signed.lock().unwrap().push(tx.clone());
        Ok(SignedTransaction::new(tx.clone(), 0, B256::ZERO, B256::ZERO))
    }

    async fn sign_and_encode(&self, tx: &UnsignedTransaction) -> Result<Bytes, WalletError> {
        self.sign(tx).await?;
        Ok(Bytes::from_static(&[0xf8, 0x6b]))
    }
}
