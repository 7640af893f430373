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

//! Per-bytecode instruction index.
//!
//! Joins a disassembly with its decoded source map. Program counters are
//! sparse once PUSH operands are present, so lookups binary-search a sorted
//! array of instruction offsets instead of indexing by byte.

use qdb_common::types::SourceMapEntry;
use tracing::debug;

use crate::{
    analysis::decode_source_map,
    utils::disasm::{Disassembly, Instruction},
    EngineError, EngineResult,
};

/// Maps program counters to instruction ordinals and ordinals to source-map entries.
#[derive(Debug, Clone)]
pub struct InstructionIndex {
    disassembly: Disassembly,
    pcs: Vec<u32>,
    entries: Option<Vec<SourceMapEntry>>,
}

impl InstructionIndex {
    /// Build an index from a disassembly and its decoded source map.
    ///
    /// Fails with [`EngineError::SourceMapInstructionMismatch`] when the map
    /// does not have exactly one entry per instruction.
    pub fn new(disassembly: Disassembly, entries: Vec<SourceMapEntry>) -> EngineResult<Self> {
        if entries.len() != disassembly.len() {
            return Err(EngineError::SourceMapInstructionMismatch {
                entries: entries.len(),
                instructions: disassembly.len(),
            });
        }

        let pcs = disassembly.instructions.iter().map(|inst| inst.pc).collect();
        debug!(instructions = disassembly.len(), "built instruction index");
        Ok(Self { disassembly, pcs, entries: Some(entries) })
    }

    /// Build an index from a disassembly and the compact source-map text.
    pub fn from_source_map(disassembly: Disassembly, source_map: &str) -> EngineResult<Self> {
        let entries = decode_source_map(source_map)?;
        Self::new(disassembly, entries)
    }

    /// Build an index for bytecode that has no source map.
    ///
    /// Every source lookup on such an index yields `None`.
    pub fn without_source_map(disassembly: Disassembly) -> Self {
        let pcs = disassembly.instructions.iter().map(|inst| inst.pc).collect();
        Self { disassembly, pcs, entries: None }
    }

    /// Ordinal of the instruction starting at `pc`.
    ///
    /// A `pc` pointing into PUSH operand bytes does not start an instruction
    /// and yields `None`.
    pub fn pc_to_ordinal(&self, pc: u32) -> Option<u32> {
        self.pcs.binary_search(&pc).ok().map(|ordinal| ordinal as u32)
    }

    /// Source-map entry of the instruction with the given ordinal.
    pub fn ordinal_to_source(&self, ordinal: u32) -> Option<SourceMapEntry> {
        self.entries.as_ref()?.get(ordinal as usize).copied()
    }

    /// Source-map entry of the instruction starting at `pc`.
    pub fn source_at_pc(&self, pc: u32) -> Option<SourceMapEntry> {
        self.ordinal_to_source(self.pc_to_ordinal(pc)?)
    }

    /// Instruction with the given ordinal
    pub fn instruction(&self, ordinal: u32) -> Option<&Instruction> {
        self.disassembly.instructions.get(ordinal as usize)
    }

    /// The underlying disassembly
    pub fn disassembly(&self) -> &Disassembly {
        &self.disassembly
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    /// Whether the bytecode was empty
    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }

    /// Whether a source map is attached
    pub fn has_source_map(&self) -> bool {
        self.entries.is_some()
    }
}
