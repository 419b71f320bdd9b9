//! Contract facade: ABI-aware calls, transactions and deployment.

use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Bytes, B256, U256};
use tokio::sync::oneshot;

use cfxrpc_core::types::{CallRequest, Epoch, Log, UnsignedTransaction};
use cfxrpc_core::Address;

use crate::abi::AbiCodec;
use crate::cfx::CfxClient;
use crate::error::ClientError;
use crate::populator::SigningClient;
use crate::tracker::{ConfirmationTracker, TrackerConfig};

/// Options for read-only calls.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub from: Option<Address>,
    pub value: Option<U256>,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    /// Defaults to `latest_state`.
    pub epoch: Option<Epoch>,
}

/// Options for state-changing transactions. Unset fields are populated.
#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    pub from: Option<Address>,
    pub value: Option<U256>,
    pub nonce: Option<U256>,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub storage_limit: Option<U256>,
}

impl TxOptions {
    fn transaction(&self, to: Option<Address>, data: Bytes) -> UnsignedTransaction {
        UnsignedTransaction {
            from: self.from,
            to,
            value: self.value,
            nonce: self.nonce,
            gas: self.gas,
            gas_price: self.gas_price,
            storage_limit: self.storage_limit,
            data,
            ..Default::default()
        }
    }
}

/// A contract at a known address.
#[derive(Clone)]
pub struct Contract {
    codec: Arc<dyn AbiCodec>,
    address: Address,
    cfx: Arc<CfxClient>,
    signer: Option<Arc<SigningClient>>,
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.address)
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

impl Contract {
    /// Read-only binding. Attach a signer with [`with_signer`](Self::with_signer)
    /// to send transactions.
    pub fn new(codec: Arc<dyn AbiCodec>, address: Address, cfx: Arc<CfxClient>) -> Self {
        let address = address.with_network_id(cfx.network_id());
        Self {
            codec,
            address,
            cfx,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<SigningClient>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn network_id(&self) -> u32 {
        self.cfx.network_id()
    }

    pub fn codec(&self) -> &Arc<dyn AbiCodec> {
        &self.codec
    }

    /// Call data for `method(args)` without sending anything.
    pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, ClientError> {
        self.codec.encode_call(method, args)
    }

    /// Execute `method` with `cfx_call` and decode its return values.
    pub async fn call(
        &self,
        opts: &CallOptions,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ClientError> {
        let data = self.encode_call(method, args)?;
        let request = CallRequest {
            from: opts.from,
            to: Some(self.address),
            gas_price: opts.gas_price,
            gas: opts.gas,
            value: opts.value,
            data: Some(data),
            ..Default::default()
        };
        let epoch = opts.epoch.unwrap_or(Epoch::LatestState);
        let output = self.cfx.call(request, Some(epoch)).await?;
        let decoded = self.codec.decode_result(method, args, &output);
        if output.is_empty() {
            // `0x` is a valid reply only for a method without outputs.
            return match decoded {
                Ok(values) if values.is_empty() => Ok(values),
                _ => Err(ClientError::EmptyResponse),
            };
        }
        decoded
    }

    /// Send `method(args)` as a transaction and return its hash.
    pub async fn send_transaction(
        &self,
        opts: &TxOptions,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<B256, ClientError> {
        let signer = self.signer.as_ref().ok_or(ClientError::NoAccountFound)?;
        let data = self.encode_call(method, args)?;
        let hash = signer
            .send_transaction(opts.transaction(Some(self.address), data))
            .await?;
        tracing::debug!(contract = %self.address, method, %hash, "contract transaction sent");
        Ok(hash)
    }

    /// Decode `log` as `event`.
    pub fn decode_event(&self, event: &str, log: &Log) -> Result<Vec<DynSolValue>, ClientError> {
        self.codec.decode_log(event, log)
    }

    /// Deploy `bytecode` with `constructor_args` in the background.
    ///
    /// Argument encoding happens before returning. Submission and
    /// confirmation run on a spawned task whose result arrives once through
    /// the returned [`PendingDeployment`].
    pub fn deploy(
        signer: Arc<SigningClient>,
        codec: Arc<dyn AbiCodec>,
        opts: &TxOptions,
        bytecode: &[u8],
        constructor_args: &[DynSolValue],
        tracker: TrackerConfig,
    ) -> Result<PendingDeployment, ClientError> {
        let data = codec.encode_constructor(bytecode, constructor_args)?;
        let tx = opts.transaction(None, data);
        let (done, rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = run_deployment(signer, codec, tx, tracker).await;
            let _ = done.send(result);
        });
        Ok(PendingDeployment { rx })
    }
}

async fn run_deployment(
    signer: Arc<SigningClient>,
    codec: Arc<dyn AbiCodec>,
    tx: UnsignedTransaction,
    config: TrackerConfig,
) -> DeploymentResult {
    let hash = match signer.send_transaction(tx).await {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(error = %e, "deployment submission failed");
            return DeploymentResult {
                transaction_hash: None,
                result: Err(e),
            };
        }
    };

    let timeout = config.timeout;
    let tracker = ConfirmationTracker::new(signer.cfx().clone(), config);
    let outcome = tracker.wait_for_receipt(hash).await;
    let result = outcome
        .into_receipt(hash, timeout)
        .and_then(|receipt| receipt.contract_created.ok_or(ClientError::MissingContractAddress))
        .map(|address| {
            tracing::info!(%hash, contract = %address, "contract deployed");
            Contract::new(codec, address, signer.cfx().clone()).with_signer(signer)
        });
    if let Err(e) = &result {
        tracing::warn!(%hash, error = %e, "deployment failed");
    }
    DeploymentResult {
        transaction_hash: Some(hash),
        result,
    }
}

/// Outcome of a background deployment.
#[derive(Debug)]
pub struct DeploymentResult {
    /// Set once the transaction was accepted by the node.
    pub transaction_hash: Option<B256>,
    pub result: Result<Contract, ClientError>,
}

/// Single-use handle to a deployment in progress.
#[derive(Debug)]
pub struct PendingDeployment {
    rx: oneshot::Receiver<DeploymentResult>,
}

impl PendingDeployment {
    /// Wait for the deployment to finish.
    pub async fn wait(self) -> DeploymentResult {
        self.rx.await.unwrap_or_else(|_| DeploymentResult {
            transaction_hash: None,
            result: Err(ClientError::Cancelled),
        })
    }
}
