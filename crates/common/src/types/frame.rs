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

use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::{SourceLocation, SourceMapEntry};

/// Which of a contract's two bytecodes a frame executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeKind {
    /// Deployed (runtime) bytecode
    Runtime,
    /// Constructor (creation) bytecode
    Creation,
}

/// How a frame was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// The outermost frame of the transaction
    Root,
    /// `CALL`
    Call,
    /// `CALLCODE`
    CallCode,
    /// `DELEGATECALL`
    DelegateCall,
    /// `STATICCALL`
    StaticCall,
    /// `CREATE`
    Create,
    /// `CREATE2`
    Create2,
}

impl CallKind {
    /// The frame kind entered by the given mnemonic, if it opens a frame at all.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        match mnemonic {
            "CALL" => Some(Self::Call),
            "CALLCODE" => Some(Self::CallCode),
            "DELEGATECALL" => Some(Self::DelegateCall),
            "STATICCALL" => Some(Self::StaticCall),
            "CREATE" => Some(Self::Create),
            "CREATE2" => Some(Self::Create2),
            _ => None,
        }
    }

    /// Whether the frame runs constructor code.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "ROOT",
            Self::Call => "CALL",
            Self::CallCode => "CALLCODE",
            Self::DelegateCall => "DELEGATECALL",
            Self::StaticCall => "STATICCALL",
            Self::Create => "CREATE",
            Self::Create2 => "CREATE2",
        };
        f.write_str(name)
    }
}

/// One frame of a reconstructed call stack.
///
/// Reconstruction works from stack snapshots only, so the callee address is
/// `None` when it cannot be read back (contract creation, truncated stack).
/// Function name and call-site source are then `None` as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    /// Address whose code the frame executes
    pub address: Option<Address>,
    /// Function name decoded from the call data selector
    pub function_name: Option<String>,
    /// Source-map entry of the call site in the caller
    pub source: Option<SourceMapEntry>,
    /// Resolved call-site location in the caller
    pub location: Option<SourceLocation>,
    /// Trace step at which the frame's first instruction runs
    pub entered_at_step: u32,
    /// Call depth of the frame (root is 0)
    pub depth: u32,
    /// How the frame was entered
    pub call_kind: CallKind,
    /// Which bytecode of `address` the frame executes
    pub code_kind: CodeKind,
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ", self.depth, self.call_kind)?;
        match &self.address {
            Some(address) => write!(f, "{address}")?,
            None => f.write_str("<unknown>")?,
        }
        if let Some(name) = &self.function_name {
            write!(f, "::{name}")?;
        }
        write!(f, " @ step {}", self.entered_at_step)
    }
}

/// Frames from the outermost (index 0) to the innermost.
pub type CallStack = Vec<CallFrame>;
