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

use alloy_primitives::{hex, U256};
use serde::{Deserialize, Serialize};

/// One VM state snapshot per executed opcode.
///
/// Steps are produced by an external tracer and are never mutated by the
/// engine. The `stack` follows the node convention: the top of the stack is
/// the **last** element. `memory` is a sequence of hex-encoded words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Position of this step within the trace
    pub index: u32,
    /// Program counter (byte offset) of the executed instruction
    pub pc: u32,
    /// Mnemonic of the executed opcode as reported by the tracer
    pub opcode_name: String,
    /// Stack items, bottom first
    #[serde(default)]
    pub stack: Vec<String>,
    /// Memory contents as hex-encoded words
    #[serde(default)]
    pub memory: Vec<String>,
    /// Storage slots reported by the tracer at this step
    #[serde(default)]
    pub storage_delta: BTreeMap<String, String>,
    /// Gas remaining before the instruction executed
    #[serde(default)]
    pub gas_left: u64,
    /// Exceptional halt reported by the tracer at this step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Call depth as reported by the tracer (1-based), when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracer_depth: Option<u32>,
}

impl TraceStep {
    /// Create a bare step with empty stack, memory and storage.
    pub fn new(index: u32, pc: u32, opcode_name: impl Into<String>) -> Self {
        Self {
            index,
            pc,
            opcode_name: opcode_name.into(),
            stack: Vec::new(),
            memory: Vec::new(),
            storage_delta: BTreeMap::new(),
            gas_left: 0,
            error: None,
            tracer_depth: None,
        }
    }

    /// Set the call depth reported by the tracer.
    pub fn with_tracer_depth(mut self, depth: u32) -> Self {
        self.tracer_depth = Some(depth);
        self
    }

    /// Replace the stack (bottom first).
    pub fn with_stack<I, S>(mut self, stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack = stack.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the memory words.
    pub fn with_memory<I, S>(mut self, memory: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memory = memory.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the tracer reported an exceptional halt at this step.
    pub fn is_exceptional_halt(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// The `n`-th stack item counted from the top (0 = top of stack).
    pub fn stack_from_top(&self, n: usize) -> Option<&str> {
        let pos = self.stack.len().checked_sub(n + 1)?;
        self.stack.get(pos).map(String::as_str)
    }

    /// The `n`-th stack item from the top, parsed as a 256-bit word.
    pub fn stack_word(&self, n: usize) -> Option<U256> {
        parse_word(self.stack_from_top(n)?)
    }

    /// Read `len` bytes of memory starting at `offset`.
    ///
    /// Bytes past the recorded memory size read as zero, as they would in the
    /// VM. Returns `None` if the memory words are not valid hex.
    pub fn read_memory(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        let mut flat = Vec::with_capacity(self.memory.len() * 32);
        for word in &self.memory {
            flat.extend(hex::decode(word.trim()).ok()?);
        }

        let mut out = vec![0u8; len];
        if offset < flat.len() {
            let end = flat.len().min(offset.saturating_add(len));
            out[..end - offset].copy_from_slice(&flat[offset..end]);
        }
        Some(out)
    }
}

/// Parse a hex-encoded stack word, with or without the `0x` prefix.
pub fn parse_word(raw: &str) -> Option<U256> {
    let digits = raw.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

/// A linear execution trace, shared read-only between the navigator and the projector.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Deref, derive_more::From,
)]
#[serde(transparent)]
pub struct Trace {
    inner: Vec<TraceStep>,
}

impl FromIterator<TraceStep> for Trace {
    fn from_iter<T: IntoIterator<Item = TraceStep>>(iter: T) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

impl IntoIterator for Trace {
    type Item = TraceStep;
    type IntoIter = std::vec::IntoIter<TraceStep>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a TraceStep;
    type IntoIter = std::slice::Iter<'a, TraceStep>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl Trace {
    /// Create a new empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trace from node `structLogs`, numbering steps in order.
    pub fn from_struct_logs(logs: Vec<StructLog>) -> Self {
        logs.into_iter().enumerate().map(|(i, log)| log.into_trace_step(i as u32)).collect()
    }

    /// Get the number of steps
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the trace is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A single `structLogs` entry as returned by `debug_traceTransaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLog {
    /// Program counter
    pub pc: u64,
    /// Opcode mnemonic
    pub op: String,
    /// Gas remaining
    #[serde(default)]
    pub gas: u64,
    /// Cost of this opcode
    #[serde(default)]
    pub gas_cost: u64,
    /// Call depth as reported by the node (1-based)
    #[serde(default)]
    pub depth: u64,
    /// Stack, bottom first
    #[serde(default)]
    pub stack: Option<Vec<String>>,
    /// Memory words
    #[serde(default)]
    pub memory: Option<Vec<String>>,
    /// Storage of the executing contract
    #[serde(default)]
    pub storage: Option<BTreeMap<String, String>>,
    /// Exceptional halt reason
    #[serde(default)]
    pub error: Option<String>,
}

impl StructLog {
    /// Convert into a [`TraceStep`] at position `index`.
    pub fn into_trace_step(self, index: u32) -> TraceStep {
        TraceStep {
            index,
            pc: self.pc as u32,
            opcode_name: self.op,
            stack: self.stack.unwrap_or_default(),
            memory: self.memory.unwrap_or_default(),
            storage_delta: self.storage.unwrap_or_default(),
            gas_left: self.gas,
            error: self.error.filter(|e| !e.is_empty()),
            // a missing `depth` deserializes as 0
            tracer_depth: (self.depth > 0).then_some(self.depth as u32),
        }
    }
}

/// The result object of `debug_traceTransaction` with the default struct logger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLogTrace {
    /// Gas used by the transaction
    #[serde(default)]
    pub gas: u64,
    /// Whether execution failed
    #[serde(default)]
    pub failed: bool,
    /// Hex-encoded return data
    #[serde(default)]
    pub return_value: String,
    /// Per-opcode logs
    #[serde(default)]
    pub struct_logs: Vec<StructLog>,
}
