//! Transaction population, signing and submission.
//!
//! [`SigningClient::populate_transaction`] fills every field a signer needs,
//! querying the node only for what the caller left unset:
//!
//! 1. `from` from the wallet's default account
//! 2. `from` / `to` completed with the network id
//! 3. `nonce` via `cfx_getNextNonce`
//! 4. `chain_id` via `cfx_getStatus` (falls back to `0`)
//! 5. `gas_price` via `cfx_gasPrice`, raised to [`MIN_GAS_PRICE`]
//! 6. `epoch_height` via `cfx_epochNumber("latest_state")`
//! 7. `gas` / `storage_limit` via `cfx_estimateGasAndCollateral`
//! 8. local defaults for `value`, `gas` and `data`
//!
//! Estimation runs last so the node sees the final transaction.

use std::sync::Arc;

use alloy_primitives::{Bytes, B256, U256};

use cfxrpc_core::types::{CallRequest, Epoch, UnsignedTransaction};
use cfxrpc_core::Address;

use crate::cfx::CfxClient;
use crate::error::ClientError;
use crate::wallet::{Wallet, WalletError};

/// Protocol minimum gas price, 1 GDrip.
pub const MIN_GAS_PRICE: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// Gas of a plain transfer.
pub const DEFAULT_GAS: U256 = U256::from_limbs([21_000, 0, 0, 0]);

/// Estimated storage collateral plus an 1/9 safety margin, truncating.
///
/// `9 -> 10`, `18 -> 20`, `19 -> 21`.
pub fn storage_limit_with_margin(collateral: U256) -> U256 {
    collateral.saturating_mul(U256::from(10u64)) / U256::from(9u64)
}

/// Node client paired with a wallet.
pub struct SigningClient {
    cfx: Arc<CfxClient>,
    wallet: Arc<dyn Wallet>,
}

impl SigningClient {
    pub fn new(cfx: Arc<CfxClient>, wallet: Arc<dyn Wallet>) -> Self {
        Self { cfx, wallet }
    }

    pub fn cfx(&self) -> &Arc<CfxClient> {
        &self.cfx
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    /// Build and populate a transaction in one step.
    pub async fn new_transaction(
        &self,
        from: Option<Address>,
        to: Option<Address>,
        value: Option<U256>,
        data: Bytes,
    ) -> Result<UnsignedTransaction, ClientError> {
        let mut tx = UnsignedTransaction {
            from,
            to,
            value,
            data,
            ..Default::default()
        };
        self.populate_transaction(&mut tx).await?;
        Ok(tx)
    }

    /// Fill every unset field of `tx`. A fully populated transaction is left
    /// unchanged and no request is sent.
    pub async fn populate_transaction(&self, tx: &mut UnsignedTransaction) -> Result<(), ClientError> {
        let network_id = self.cfx.network_id();

        if tx.from.is_none() {
            let from = self.wallet.default_address().await.map_err(|e| match e {
                WalletError::NoAccountFound => ClientError::MissingFromAddress,
                other => ClientError::Wallet(other),
            })?;
            tx.from = Some(from);
        }

        if let Some(from) = tx.from.as_mut() {
            from.complete(network_id);
        }
        if let Some(to) = tx.to.as_mut() {
            to.complete(network_id);
        }

        if tx.nonce.is_none() {
            let from = tx.from.ok_or(ClientError::MissingFromAddress)?;
            let nonce = self
                .cfx
                .next_nonce(from, None)
                .await
                .map_err(ClientError::population("nonce"))?;
            tx.nonce = Some(nonce);
        }

        if tx.chain_id.is_none() {
            let chain_id = match self.cfx.status().await {
                Ok(status) => status.chain_id,
                Err(e) => {
                    tracing::warn!(error = %e, "chain id lookup failed, using 0");
                    0
                }
            };
            tx.chain_id = Some(chain_id);
        }

        if tx.gas_price.is_none() {
            let price = self
                .cfx
                .gas_price()
                .await
                .map_err(ClientError::population("gas price"))?;
            tx.gas_price = Some(price.max(MIN_GAS_PRICE));
        }

        if tx.epoch_height.is_none() {
            let epoch = self
                .cfx
                .epoch_number(Some(Epoch::LatestState))
                .await
                .map_err(ClientError::population("epoch height"))?;
            tx.epoch_height = Some(epoch);
        }

        if tx.gas.is_none() || tx.storage_limit.is_none() {
            let estimate = self
                .cfx
                .estimate_gas_and_collateral(CallRequest::from_transaction(tx), None)
                .await
                .map_err(ClientError::population("gas and storage limit"))?;
            tracing::debug!(
                gas_limit = %estimate.gas_limit,
                storage = %estimate.storage_collateralized,
                "estimated transaction"
            );
            if tx.gas.is_none() {
                tx.gas = Some(estimate.gas_limit);
            }
            if tx.storage_limit.is_none() {
                tx.storage_limit = Some(storage_limit_with_margin(estimate.storage_collateralized));
            }
        }

        tx.value.get_or_insert(U256::ZERO);
        tx.gas.get_or_insert(DEFAULT_GAS);
        Ok(())
    }

    /// Populate, sign and submit `tx`, returning its hash.
    pub async fn send_transaction(&self, mut tx: UnsignedTransaction) -> Result<B256, ClientError> {
        self.populate_transaction(&mut tx).await?;
        let raw = self.wallet.sign_and_encode(&tx).await?;
        let hash = self.send_raw_transaction(raw).await?;
        tracing::info!(%hash, nonce = ?tx.nonce, "transaction sent");
        Ok(hash)
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, ClientError> {
        self.cfx.send_raw_transaction(raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cfx_client, populating_node, receiver, sender, MockNode, MockWallet};
    use cfxrpc_core::address::TESTNET_ID;
    use cfxrpc_core::TransportError;
    use serde_json::{json, Value};

    fn signer(node: &Arc<MockNode>, wallet: Arc<MockWallet>) -> SigningClient {
        SigningClient::new(Arc::new(cfx_client(node)), wallet)
    }

    #[test]
    fn storage_margin_truncates() {
        let margin = |n: u64| storage_limit_with_margin(U256::from(n));
        assert_eq!(margin(0), U256::ZERO);
        assert_eq!(margin(9), U256::from(10u64));
        assert_eq!(margin(18), U256::from(20u64));
        assert_eq!(margin(19), U256::from(21u64));
    }

    #[tokio::test]
    async fn steps_run_in_order_and_estimate_sees_final_fields() {
        let node = populating_node("0x3b9aca00");
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(5u64));

        client.populate_transaction(&mut tx).await.unwrap();

        assert_eq!(
            node.methods(),
            vec![
                "cfx_getNextNonce",
                "cfx_getStatus",
                "cfx_gasPrice",
                "cfx_epochNumber",
                "cfx_estimateGasAndCollateral",
            ]
        );
        let estimate = &node.params("cfx_estimateGasAndCollateral")[0][0];
        assert_eq!(estimate["from"], "cfxtest:aarc9abycue0hhzgyrr53m6cxedgccrmmy8m50bu1p");
        assert_eq!(estimate["to"], "cfxtest:acc7uawf5ubtnmezvhu9dhc6sghea0403ywjz6wtpg");
        assert_eq!(estimate["value"], "0x5");
        assert_eq!(estimate["nonce"], "0x7");
        assert_eq!(estimate["data"], "0x");

        assert_eq!(tx.from, Some(sender().with_network_id(TESTNET_ID)));
        assert_eq!(tx.nonce, Some(U256::from(7u64)));
        assert_eq!(tx.chain_id, Some(1));
        assert_eq!(tx.epoch_height, Some(100));
        assert_eq!(tx.gas, Some(U256::from(0x6000u64)));
        // 64 * 10 / 9 = 71
        assert_eq!(tx.storage_limit, Some(U256::from(71u64)));
        assert!(tx.is_populated());
    }

    #[tokio::test]
    async fn populated_transaction_is_untouched() {
        let node = populating_node("0x3b9aca00");
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(5u64));
        client.populate_transaction(&mut tx).await.unwrap();
        let sent = node.methods().len();

        let before = tx.clone();
        client.populate_transaction(&mut tx).await.unwrap();

        assert_eq!(tx, before);
        assert_eq!(node.methods().len(), sent);
    }

    #[tokio::test]
    async fn gas_price_is_raised_to_minimum() {
        let node = populating_node("0x0");
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(1u64));
        client.populate_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.gas_price, Some(MIN_GAS_PRICE));
    }

    #[tokio::test]
    async fn higher_gas_price_is_kept() {
        let node = populating_node("0x77359400");
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(1u64));
        client.populate_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.gas_price, Some(U256::from(2_000_000_000u64)));
    }

    #[tokio::test]
    async fn chain_id_failure_falls_back_to_zero() {
        let node = populating_node("0x3b9aca00");
        node.on_fn("cfx_getStatus", |_| Err(TransportError::Http("bad gateway".into())));
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(1u64));

        client.populate_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.chain_id, Some(0));
    }

    #[tokio::test]
    async fn missing_account_is_reported() {
        let node = populating_node("0x3b9aca00");
        let client = signer(&node, MockWallet::empty());
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(1u64));

        let err = client.populate_transaction(&mut tx).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingFromAddress));
        assert!(node.methods().is_empty());
    }

    #[tokio::test]
    async fn nonce_failure_names_the_field() {
        let node = populating_node("0x3b9aca00");
        node.on("cfx_getNextNonce", Value::Bool(true));
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction::transfer(receiver(), U256::from(1u64));

        let err = client.populate_transaction(&mut tx).await.unwrap_err();
        assert!(matches!(err, ClientError::Population { field: "nonce", .. }));
        assert_eq!(err.stage(), "population");
    }

    #[tokio::test]
    async fn explicit_gas_skips_only_what_is_set() {
        let node = populating_node("0x3b9aca00");
        let client = signer(&node, MockWallet::with_account(sender()));
        let mut tx = UnsignedTransaction {
            gas: Some(U256::from(50_000u64)),
            ..UnsignedTransaction::transfer(receiver(), U256::from(1u64))
        };

        client.populate_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.gas, Some(U256::from(50_000u64)));
        assert_eq!(tx.storage_limit, Some(U256::from(71u64)));
    }

    #[tokio::test]
    async fn send_transaction_signs_the_populated_transaction() {
        let node = populating_node("0x3b9aca00");
        let wallet = MockWallet::with_account(sender());
        let client = signer(&node, wallet.clone());

        let hash = client
            .send_transaction(UnsignedTransaction::transfer(receiver(), U256::from(1u64)))
            .await
            .unwrap();

        assert_eq!(hash, B256::repeat_byte(0xab));
        let signed = wallet.signed();
        assert_eq!(signed.len(), 1);
        assert!(signed[0].is_populated());
        assert_eq!(node.params("cfx_sendRawTransaction")[0], vec![json!("0xf86b")]);
    }
}
