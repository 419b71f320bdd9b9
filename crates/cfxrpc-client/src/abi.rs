//! ABI encoding for contract calls, deployments and events.
//!
//! [`AbiCodec`] is the seam the contract facade talks to; [`JsonAbiCodec`]
//! implements it over a standard ABI JSON document with `alloy-dyn-abi`.

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Bytes, B256};

use cfxrpc_core::types::Log;
use cfxrpc_core::Address;

use crate::error::ClientError;

pub trait AbiCodec: Send + Sync {
    /// Selector followed by the encoded arguments.
    fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, ClientError>;

    /// Creation bytecode followed by the encoded constructor arguments.
    fn encode_constructor(&self, bytecode: &[u8], args: &[DynSolValue]) -> Result<Bytes, ClientError>;

    /// Decode the return data of the `method` overload that accepts `args`.
    fn decode_result(
        &self,
        method: &str,
        args: &[DynSolValue],
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, ClientError>;

    /// Decode `log` as an instance of `event`, parameters in declaration order.
    fn decode_log(&self, event: &str, log: &Log) -> Result<Vec<DynSolValue>, ClientError>;
}

/// ABI value for a Conflux address. Only the 20-byte body is encoded.
pub fn address_value(address: &Address) -> DynSolValue {
    DynSolValue::Address(alloy_primitives::Address::from(*address.as_bytes()))
}

/// [`AbiCodec`] over a parsed ABI JSON document.
#[derive(Debug, Clone)]
pub struct JsonAbiCodec {
    abi: JsonAbi,
}

impl JsonAbiCodec {
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| ClientError::Decoding(format!("invalid ABI JSON: {e}")))
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Overload of `method` whose inputs accept `args`.
    fn function_for(&self, method: &str, args: &[DynSolValue]) -> Result<&Function, ClientError> {
        let overloads = self
            .abi
            .function(method)
            .ok_or_else(|| ClientError::Encoding(format!("function {method:?} not found in ABI")))?;

        let mut last_err = None;
        for func in overloads {
            match resolve(&func.inputs).and_then(|types| check_args(&types, args)) {
                Ok(()) => return Ok(func),
                Err(e) => last_err = Some(e),
            }
        }
        Err(ClientError::Encoding(format!(
            "arguments do not match {method}: {}",
            last_err.unwrap_or_default()
        )))
    }
}

fn resolve<P: Specifier<DynSolType>>(params: &[P]) -> Result<Vec<DynSolType>, String> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| p.resolve().map_err(|e| format!("param {i}: {e}")))
        .collect()
}

fn check_args(types: &[DynSolType], args: &[DynSolValue]) -> Result<(), String> {
    if types.len() != args.len() {
        return Err(format!(
            "argument count mismatch: ABI has {}, got {}",
            types.len(),
            args.len()
        ));
    }
    for (i, (ty, arg)) in types.iter().zip(args).enumerate() {
        if !ty.matches(arg) {
            return Err(format!("param {i}: expected {ty}, got {arg:?}"));
        }
    }
    Ok(())
}

fn encode_params(args: &[DynSolValue]) -> Vec<u8> {
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

fn decode_params(types: Vec<DynSolType>, data: &[u8]) -> Result<Vec<DynSolValue>, ClientError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(data)
        .map_err(|e| ClientError::Decoding(e.to_string()))?;
    Ok(match decoded {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    })
}

impl AbiCodec for JsonAbiCodec {
    fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, ClientError> {
        let func = self.function_for(method, args)?;
        let mut calldata = func.selector().to_vec();
        calldata.extend_from_slice(&encode_params(args));
        Ok(calldata.into())
    }

    fn encode_constructor(&self, bytecode: &[u8], args: &[DynSolValue]) -> Result<Bytes, ClientError> {
        let types = match self.abi.constructor() {
            Some(ctor) => resolve(&ctor.inputs).map_err(ClientError::Encoding)?,
            None => Vec::new(),
        };
        check_args(&types, args).map_err(ClientError::Encoding)?;

        let mut code = bytecode.to_vec();
        if !args.is_empty() {
            code.extend_from_slice(&encode_params(args));
        }
        Ok(code.into())
    }

    fn decode_result(
        &self,
        method: &str,
        args: &[DynSolValue],
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, ClientError> {
        let func = self.function_for(method, args).map_err(|e| match e {
            ClientError::Encoding(msg) => ClientError::Decoding(msg),
            other => other,
        })?;
        let types = resolve(&func.outputs).map_err(ClientError::Decoding)?;
        decode_params(types, data)
    }

    fn decode_log(&self, event: &str, log: &Log) -> Result<Vec<DynSolValue>, ClientError> {
        let overloads = self
            .abi
            .event(event)
            .ok_or_else(|| ClientError::Decoding(format!("event {event:?} not found in ABI")))?;
        let topic0 = log.topics.first().copied();
        let ev = overloads
            .iter()
            .find(|e| e.anonymous || Some(e.selector()) == topic0)
            .ok_or_else(|| ClientError::Decoding(format!("log is not a {event} event")))?;

        let mut topics = log.topics.iter().skip(usize::from(!ev.anonymous));
        let mut indexed = Vec::new();
        let mut data_types = Vec::new();
        for (i, param) in ev.inputs.iter().enumerate() {
            let ty = param
                .resolve()
                .map_err(|e| ClientError::Decoding(format!("param {i}: {e}")))?;
            if param.indexed {
                let topic = topics
                    .next()
                    .ok_or_else(|| ClientError::Decoding(format!("missing topic for param {i}")))?;
                indexed.push(Some(decode_topic(&ty, topic)?));
            } else {
                indexed.push(None);
                data_types.push(ty);
            }
        }

        let mut data_values = decode_params(data_types, &log.data)?.into_iter();
        indexed
            .into_iter()
            .map(|slot| match slot {
                Some(value) => Ok(value),
                None => data_values
                    .next()
                    .ok_or_else(|| ClientError::Decoding("log data too short".into())),
            })
            .collect()
    }
}

/// Indexed reference values are stored as their hash and cannot be recovered.
fn decode_topic(ty: &DynSolType, topic: &B256) -> Result<DynSolValue, ClientError> {
    if is_hashed_in_topic(ty) {
        return Ok(DynSolValue::FixedBytes(*topic, 32));
    }
    ty.abi_decode(topic.as_slice())
        .map_err(|e| ClientError::Decoding(e.to_string()))
}

/// Strings, byte strings, arrays and structs are indexed by hash, static or not.
fn is_hashed_in_topic(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}
