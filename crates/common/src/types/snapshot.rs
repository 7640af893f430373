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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CallStack, SourceLocation};

/// The externally visible view of a debugging session at its cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    /// Current step (cursor)
    pub step: u32,
    /// Number of steps in the trace
    pub total_steps: u32,
    /// Program counter of the current step
    pub pc: u32,
    /// Opcode mnemonic of the current step
    pub opcode: String,
    /// Derived call depth of the current step
    pub call_depth: u32,
    /// Gas remaining at the current step
    pub gas_left: u64,
    /// Source location, `None` for compiler-injected or unregistered code
    pub source_location: Option<SourceLocation>,
    /// Frames from the outermost to the innermost
    pub call_stack: CallStack,
    /// Stack items, bottom first
    pub stack: Vec<String>,
    /// Memory words
    pub memory: Vec<String>,
    /// Storage reported at the current step
    pub storage: BTreeMap<String, String>,
}

impl DebugSnapshot {
    /// Whether the cursor sits on the first step.
    pub fn is_first(&self) -> bool {
        self.step == 0
    }

    /// Whether the cursor sits on the last step.
    pub fn is_last(&self) -> bool {
        self.step + 1 >= self.total_steps
    }
}

/// Outcome of scanning the trace for a breakpoint.
///
/// Not finding a match is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointSearch {
    /// Whether a matching step was found
    pub found: bool,
    /// The cursor after the search (unchanged when nothing was found)
    pub step: u32,
}

/// A breakpoint search result together with the snapshot at the resulting cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointHit {
    /// Whether a matching step was found
    pub found: bool,
    /// Snapshot at the cursor after the search
    pub snapshot: DebugSnapshot,
}
