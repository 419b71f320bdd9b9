//! Argument marshalling for outbound calls.
//!
//! Every argument passed to [`RpcClient::call`](crate::client::RpcClient::call)
//! is one of a closed set of shapes. Before serialization, addresses in any of
//! those shapes are completed with the client's network id, and absent
//! optional arguments are dropped from the wire payload. The caller's values
//! are never touched; normalization works on clones.

use serde_json::Value;

use crate::address::Address;
use crate::error::TransportError;
use crate::types::{CallRequest, Epoch, LogFilter};

#[derive(Debug, Clone, PartialEq)]
pub enum RpcParam {
    Address(Address),
    OptionalAddress(Option<Address>),
    CallRequest(CallRequest),
    LogFilter(LogFilter),
    Value(Value),
    Absent,
}

impl RpcParam {
    /// Serialize any value as a plain, address-free argument.
    pub fn value<T: serde::Serialize>(value: T) -> Result<Self, TransportError> {
        serde_json::to_value(value)
            .map(Self::Value)
            .map_err(|e| TransportError::InvalidParams(e.to_string()))
    }

    /// Completed copy of this argument, or `None` if it should not be sent.
    pub fn completed(&self, network_id: u32) -> Option<Self> {
        match self {
            Self::Address(addr) => {
                let mut addr = *addr;
                addr.complete(network_id);
                Some(Self::Address(addr))
            }
            Self::OptionalAddress(None) | Self::Absent => None,
            Self::OptionalAddress(Some(addr)) => {
                let mut addr = *addr;
                addr.complete(network_id);
                Some(Self::Address(addr))
            }
            Self::CallRequest(req) => {
                let mut req = req.clone();
                complete_opt(&mut req.from, network_id);
                complete_opt(&mut req.to, network_id);
                Some(Self::CallRequest(req))
            }
            Self::LogFilter(filter) => {
                let mut filter = filter.clone();
                for addr in &mut filter.address {
                    addr.complete(network_id);
                }
                Some(Self::LogFilter(filter))
            }
            Self::Value(Value::Null) => None,
            Self::Value(v) => Some(Self::Value(v.clone())),
        }
    }

    fn to_json(&self) -> Result<Value, TransportError> {
        let out = match self {
            Self::Address(addr) => serde_json::to_value(addr),
            Self::OptionalAddress(addr) => serde_json::to_value(addr),
            Self::CallRequest(req) => serde_json::to_value(req),
            Self::LogFilter(filter) => serde_json::to_value(filter),
            Self::Value(v) => Ok(v.clone()),
            Self::Absent => Ok(Value::Null),
        };
        out.map_err(|e| TransportError::InvalidParams(e.to_string()))
    }
}

fn complete_opt(addr: &mut Option<Address>, network_id: u32) {
    if let Some(addr) = addr {
        addr.complete(network_id);
    }
}

/// Complete and serialize `params` for the wire, dropping absent entries.
pub fn normalize(params: &[RpcParam], network_id: u32) -> Result<Vec<Value>, TransportError> {
    params
        .iter()
        .filter_map(|p| p.completed(network_id))
        .map(|p| p.to_json())
        .collect()
}

impl From<Address> for RpcParam {
    fn from(addr: Address) -> Self {
        Self::Address(addr)
    }
}

impl From<Option<Address>> for RpcParam {
    fn from(addr: Option<Address>) -> Self {
        Self::OptionalAddress(addr)
    }
}

impl From<CallRequest> for RpcParam {
    fn from(req: CallRequest) -> Self {
        Self::CallRequest(req)
    }
}

impl From<LogFilter> for RpcParam {
    fn from(filter: LogFilter) -> Self {
        Self::LogFilter(filter)
    }
}

impl From<Epoch> for RpcParam {
    fn from(epoch: Epoch) -> Self {
        Self::Value(Value::String(epoch.to_string()))
    }
}

impl From<Option<Epoch>> for RpcParam {
    fn from(epoch: Option<Epoch>) -> Self {
        epoch.map_or(Self::Absent, Self::from)
    }
}

impl From<Value> for RpcParam {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for RpcParam {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_string()))
    }
}

impl From<String> for RpcParam {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<bool> for RpcParam {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<alloy_primitives::B256> for RpcParam {
    fn from(hash: alloy_primitives::B256) -> Self {
        Self::Value(Value::String(format!("0x{}", hex::encode(hash))))
    }
}

impl From<alloy_primitives::Bytes> for RpcParam {
    fn from(bytes: alloy_primitives::Bytes) -> Self {
        Self::Value(Value::String(format!("0x{}", hex::encode(&bytes))))
    }
}
