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

//! Error taxonomy of the debugging engine.
//!
//! Only structural problems are errors. Missing source information is
//! expressed as `None` on the affected values, and a breakpoint search that
//! finds nothing is a normal result.

use alloy_primitives::{Address, TxHash};
use thiserror::Error;

use crate::SessionHandle;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bytecode is not valid hex or has an odd number of digits
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(String),

    /// A source map does not describe the same number of instructions as its bytecode
    #[error(
        "source map has {entries} entries but the bytecode has {instructions} instructions"
    )]
    SourceMapInstructionMismatch {
        /// Number of decoded source-map entries
        entries: usize,
        /// Number of disassembled instructions
        instructions: usize,
    },

    /// A source-map field could not be parsed
    #[error("malformed source map: entry {entry}, field {field:?}")]
    MalformedSourceMap {
        /// Ordinal of the offending entry
        entry: usize,
        /// Raw text of the offending field
        field: String,
    },

    /// No trace could be obtained for the transaction
    #[error("trace unavailable for {tx_hash}: {reason}")]
    TraceUnavailable {
        /// Transaction whose trace was requested
        tx_hash: TxHash,
        /// Why the trace could not be supplied
        reason: String,
    },

    /// A navigation argument lies outside the trace
    #[error("step {index} is out of range (trace has {total} steps)")]
    OutOfRange {
        /// Requested step
        index: u32,
        /// Number of steps in the trace
        total: u32,
    },

    /// The handle does not name an open session
    #[error("unknown session {0}")]
    UnknownSession(SessionHandle),

    /// The session's trace is still being fetched
    #[error("session {0} is still loading its trace")]
    SessionPending(SessionHandle),

    /// The session was closed before its trace arrived
    #[error("session {0} was closed before its trace arrived")]
    SessionClosed(SessionHandle),

    /// No artifact is registered for the address
    #[error("no contract registered at {0}")]
    UnknownContract(Address),

    /// A compiler artifact could not be read
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::TraceUnavailable`].
    pub fn trace_unavailable(tx_hash: TxHash, reason: impl ToString) -> Self {
        Self::TraceUnavailable { tx_hash, reason: reason.to_string() }
    }
}

/// Failures of a trace provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure talking to the node
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error
    #[error("node error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// The node answered with something that is not the expected shape
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The node does not know the transaction
    #[error("transaction {0} not found")]
    NotFound(TxHash),

    /// The trace contains no steps
    #[error("empty trace")]
    EmptyTrace,
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
