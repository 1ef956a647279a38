//! JSON-RPC 2.0 framing.
//!
//! Every message is one JSON object on its own line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Host → plugin: describe yourself.
pub const METHOD_GET_INFO: &str = "plugin.getInfo";

/// Host → plugin: run a hook.
pub const METHOD_EXECUTE: &str = "plugin.execute";

/// Host → plugin: check a configuration map.
pub const METHOD_VALIDATE: &str = "plugin.validate";

/// Host → plugin notification: abandon an in-flight request.
pub const METHOD_CANCEL: &str = "$/cancelRequest";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const REQUEST_CANCELLED: i64 = -32800;

/// A call expecting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A one-way message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// The error member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The answer to a [`Request`].
///
/// `id` is `None` only when the request itself could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    #[must_use]
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self::failure(
            id,
            ErrorObject {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    #[must_use]
    pub fn failure(id: Option<u64>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Params of [`METHOD_CANCEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelParams {
    pub id: u64,
}

/// Any inbound line, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

impl Message {
    /// Parses and classifies one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not JSON or fits no message shape.
    pub fn parse(line: &str) -> Result<Self, String> {
        let raw: RawMessage = serde_json::from_str(line).map_err(|e| e.to_string())?;
        if raw.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err("missing or unsupported jsonrpc version".to_string());
        }
        match (raw.method, raw.id) {
            (Some(method), Some(id)) => Ok(Self::Request(Request {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                method,
                params: raw.params,
            })),
            (Some(method), None) => Ok(Self::Notification(Notification {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method,
                params: raw.params,
            })),
            (None, id) if raw.result.is_some() || raw.error.is_some() => {
                Ok(Self::Response(Response {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    result: raw.result,
                    error: raw.error,
                }))
            }
            (None, _) => Err("message has neither method nor result".to_string()),
        }
    }
}

/// Serializes a message as one line, newline included.
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
pub fn encode_line<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
