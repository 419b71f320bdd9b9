//! JSON-RPC 2.0 wire types and batch elements.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;
use crate::normalize::RpcParam;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl RpcId {
    pub fn number(n: u64) -> Self {
        Self::Number(n)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Internal-error code used when a batch response is missing an entry.
    pub const MISSING_RESPONSE: i64 = -32603;
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`.
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response carrying `error`.
    pub fn failure(id: RpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` if this is a successful response (has result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return an error.
    ///
    /// A missing `result` is read as `null`, which is how nodes report
    /// "not found" for receipts and transactions.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// One call inside a batch request.
///
/// After [`RpcClient::batch_call`](crate::client::RpcClient::batch_call)
/// returns `Ok`, exactly one of `result` and `error` is set.
#[derive(Debug, Clone)]
pub struct BatchElement {
    pub method: String,
    pub params: Vec<RpcParam>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

impl BatchElement {
    pub fn new(method: impl Into<String>, params: Vec<RpcParam>) -> Self {
        Self {
            method: method.into(),
            params,
            result: None,
            error: None,
        }
    }

    /// Record the node's answer for this element.
    pub fn fill(&mut self, response: JsonRpcResponse) {
        match response.into_result() {
            Ok(value) => {
                self.result = Some(value);
                self.error = None;
            }
            Err(err) => {
                self.result = None;
                self.error = Some(err);
            }
        }
    }

    /// Mark the element as unanswered by the node.
    pub fn fill_missing(&mut self) {
        self.result = None;
        self.error = Some(JsonRpcError {
            code: JsonRpcError::MISSING_RESPONSE,
            message: format!("no response for {} in batch", self.method),
            data: None,
        });
    }

    /// Deserialize this element's result, or surface its error.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        if let Some(err) = &self.error {
            return Err(TransportError::Rpc(err.clone()));
        }
        let value = self.result.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }
}
