// QDB - Contract Trace Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON-RPC protocol types and data structures.
//!
//! All types follow the JSON-RPC 2.0 specification.
//!
//! - [`RpcRequest`] - Incoming request with method and parameters
//! - [`RpcResponse`] - Outgoing response with result or error
//! - [`RpcError`] - Structured error information
//! - [`RpcId`] - Request/response identifier (string or number)
//!
//! Error codes live in the [`error_codes`] module.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name to invoke (e.g., "qdb_stepInto")
    pub method: String,
    /// Optional method parameters, positional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request identifier for matching with response
    #[serde(default)]
    pub id: RpcId,
}

/// JSON-RPC 2.0 response structure.
///
/// Contains either a successful result or an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Successful method result (omitted if error occurred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (omitted if method succeeded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Request identifier matching the original request
    pub id: RpcId,
}

impl RpcResponse {
    /// Successful response
    pub fn success(id: RpcId, result: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    /// Error response
    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code indicating the error type
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC request/response identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric identifier
    Number(u64),
    /// String identifier
    String(String),
    /// Missing or null identifier
    #[default]
    Null,
}

/// JSON-RPC error codes.
///
/// Standard JSON-RPC 2.0 codes plus debugger-specific ones starting at -33000.
pub mod error_codes {
    // Standard JSON-RPC 2.0 error codes

    /// Parse error - Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request - The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist or is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    // Debugger-specific error codes (starting from -33000)

    /// Step index is out of bounds
    pub const STEP_OUT_OF_BOUNDS: i32 = -33001;
    /// Session handle is unknown or was closed
    pub const UNKNOWN_SESSION: i32 = -33002;
    /// Session is still fetching its trace
    pub const SESSION_PENDING: i32 = -33003;
    /// No trace could be obtained for the transaction
    pub const TRACE_UNAVAILABLE: i32 = -33004;
    /// Bytecode, source map or artifact do not agree
    pub const CONTRACT_MISMATCH: i32 = -33005;
}
