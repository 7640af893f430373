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

//! RPC server utilities
//!
//! Port discovery, parameter extraction and error conversion helpers.

use eyre::{eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::net::{SocketAddr, TcpListener};
use tracing::{debug, info};

use super::types::{error_codes, RpcError};
use crate::EngineError;

/// Find an available port starting from a base port
pub fn find_available_port(start_port: u16) -> Result<u16> {
    for port in start_port..65535 {
        if is_port_available(port) {
            info!("Found available port: {port}");
            return Ok(port);
        }
    }
    Err(eyre!("No available port found in range {start_port}-65534"))
}

/// Check if a port is available on localhost
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind(("127.0.0.1", port)) {
        Ok(_) => {
            debug!("Port {port} is available");
            true
        }
        Err(_) => {
            debug!("Port {port} is not available");
            false
        }
    }
}

/// Get default RPC server port (tries 3000 first, then searches)
pub fn get_default_rpc_port() -> Result<u16> {
    if is_port_available(3000) {
        Ok(3000)
    } else {
        find_available_port(3001)
    }
}

/// Parse a socket address, with sensible defaults
pub fn parse_socket_addr(addr_str: Option<&str>, default_port: u16) -> Result<SocketAddr> {
    match addr_str {
        Some(addr) => addr.parse().map_err(|e| eyre!("Invalid socket address '{addr}': {e}")),
        None => Ok(SocketAddr::from(([127, 0, 0, 1], default_port))),
    }
}

/// Convert error to RPC error format
pub fn to_rpc_error(code: i32, message: &str, data: Option<Value>) -> RpcError {
    RpcError { code, message: message.to_string(), data }
}

/// Helper to create internal error responses
pub fn internal_error(message: &str) -> RpcError {
    to_rpc_error(error_codes::INTERNAL_ERROR, message, None)
}

/// Helper to create method not found error
pub fn method_not_found(method: &str) -> RpcError {
    to_rpc_error(error_codes::METHOD_NOT_FOUND, &format!("Method '{method}' not found"), None)
}

/// Helper to create invalid params error
pub fn invalid_params(message: &str) -> RpcError {
    to_rpc_error(error_codes::INVALID_PARAMS, message, None)
}

/// Map an engine error onto its JSON-RPC error code.
pub fn engine_error(err: EngineError) -> RpcError {
    let code = match &err {
        EngineError::OutOfRange { .. } => error_codes::STEP_OUT_OF_BOUNDS,
        EngineError::UnknownSession(_) | EngineError::SessionClosed(_) => {
            error_codes::UNKNOWN_SESSION
        }
        EngineError::SessionPending(_) => error_codes::SESSION_PENDING,
        EngineError::TraceUnavailable { .. } => error_codes::TRACE_UNAVAILABLE,
        EngineError::SourceMapInstructionMismatch { .. }
        | EngineError::MalformedSourceMap { .. }
        | EngineError::UnknownContract(_)
        | EngineError::InvalidArtifact(_) => error_codes::CONTRACT_MISMATCH,
        EngineError::MalformedBytecode(_) => error_codes::INVALID_PARAMS,
    };
    to_rpc_error(code, &err.to_string(), None)
}

/// Extract the positional parameter at `index`.
pub fn param<T: DeserializeOwned>(params: &Option<Value>, index: usize, name: &str) -> Result<T, RpcError> {
    let value = params
        .as_ref()
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.get(index))
        .ok_or_else(|| invalid_params(&format!("Invalid params: missing {name} at position {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| invalid_params(&format!("Invalid params: bad {name}: {e}")))
}

/// Serialize a method result.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| internal_error(&format!("Failed to serialize result: {e}")))
}
