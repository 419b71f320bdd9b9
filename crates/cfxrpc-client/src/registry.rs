//! Caller-owned cache of contract bindings, keyed by network id and name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cfxrpc_core::Address;

use crate::abi::AbiCodec;
use crate::cfx::CfxClient;
use crate::contract::Contract;
use crate::error::ClientError;

/// Built-in contracts at fixed addresses on every Conflux network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalContract {
    AdminControl,
    SponsorWhitelistControl,
    Staking,
    PosRegister,
    CrossSpaceCall,
    ParamsControl,
}

impl InternalContract {
    pub const ALL: [Self; 6] = [
        Self::AdminControl,
        Self::SponsorWhitelistControl,
        Self::Staking,
        Self::PosRegister,
        Self::CrossSpaceCall,
        Self::ParamsControl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AdminControl => "AdminControl",
            Self::SponsorWhitelistControl => "SponsorWhitelistControl",
            Self::Staking => "Staking",
            Self::PosRegister => "PoSRegister",
            Self::CrossSpaceCall => "CrossSpaceCall",
            Self::ParamsControl => "ParamsControl",
        }
    }

    fn last_byte(&self) -> u8 {
        match self {
            Self::AdminControl => 0x00,
            Self::SponsorWhitelistControl => 0x01,
            Self::Staking => 0x02,
            Self::PosRegister => 0x05,
            Self::CrossSpaceCall => 0x06,
            Self::ParamsControl => 0x07,
        }
    }

    /// `0x0888…00NN`, completed for `network_id`.
    pub fn address(&self, network_id: u32) -> Address {
        let mut body = [0u8; 20];
        body[0] = 0x08;
        body[1] = 0x88;
        body[19] = self.last_byte();
        Address::from_bytes(body).with_network_id(network_id)
    }
}

type Key = (u32, String);

/// Contract bindings shared by one application.
///
/// Nothing is global: build one registry, keep it next to the clients it
/// serves and pass it by reference. Bindings for different networks never
/// collide because the network id is part of the key.
#[derive(Default)]
pub struct ContractRegistry {
    entries: RwLock<HashMap<Key, Contract>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Key, Contract>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Key, Contract>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Store `contract` under `name` on its own network, returning the
    /// binding it replaced.
    pub fn register(&self, name: impl Into<String>, contract: Contract) -> Option<Contract> {
        let key = (contract.network_id(), name.into());
        self.write().insert(key, contract)
    }

    pub fn get(&self, network_id: u32, name: &str) -> Option<Contract> {
        self.read().get(&(network_id, name.to_string())).cloned()
    }

    /// Cached binding, or the one `build` creates. `build` runs at most once
    /// per key; a failed build caches nothing.
    pub fn get_or_try_insert<F>(
        &self,
        network_id: u32,
        name: &str,
        build: F,
    ) -> Result<Contract, ClientError>
    where
        F: FnOnce() -> Result<Contract, ClientError>,
    {
        if let Some(found) = self.get(network_id, name) {
            return Ok(found);
        }
        let mut entries = self.write();
        let key = (network_id, name.to_string());
        if let Some(found) = entries.get(&key) {
            return Ok(found.clone());
        }
        let contract = build()?;
        entries.insert(key, contract.clone());
        tracing::debug!(network_id, name, address = %contract.address(), "contract registered");
        Ok(contract)
    }

    /// Binding for a built-in contract on `cfx`'s network.
    pub fn internal(
        &self,
        cfx: &Arc<CfxClient>,
        which: InternalContract,
        codec: Arc<dyn AbiCodec>,
    ) -> Contract {
        let network_id = cfx.network_id();
        if let Some(found) = self.get(network_id, which.name()) {
            return found;
        }
        self.write()
            .entry((network_id, which.name().to_string()))
            .or_insert_with(|| Contract::new(codec, which.address(network_id), cfx.clone()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
