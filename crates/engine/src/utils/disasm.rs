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

//! EVM bytecode disassembly
//!
//! Turns a bytecode buffer into an ordered list of [`Instruction`]s. PUSH
//! operands are folded into the instruction that owns them, so program
//! counters are strictly increasing and the instruction sizes add up to the
//! buffer length exactly.
//!
//! Disassembly is total: unassigned opcode values become `UNKNOWN(0xNN)`
//! instructions and a PUSH cut short by the end of the buffer keeps only the
//! operand bytes that are present.

use alloy_primitives::{Bytes, U256};
use qdb_common::{mnemonic_of, push_size_of};
use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

/// A single disassembled instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Byte offset of the opcode
    pub pc: u32,
    /// Raw opcode byte
    pub opcode: u8,
    /// Opcode name, `UNKNOWN(0xNN)` for unassigned values
    pub mnemonic: String,
    /// Operand bytes of a `PUSHn` instruction
    pub immediate: Option<Vec<u8>>,
}

impl Instruction {
    /// Create a new instruction without immediate data
    pub fn new(pc: u32, opcode: u8) -> Self {
        Self { pc, opcode, mnemonic: mnemonic_of(opcode), immediate: None }
    }

    /// Create a new instruction with immediate data
    pub fn with_immediate(pc: u32, opcode: u8, immediate: Vec<u8>) -> Self {
        Self { pc, opcode, mnemonic: mnemonic_of(opcode), immediate: Some(immediate) }
    }

    /// Check if this instruction is a `PUSH1`..`PUSH32`
    pub fn is_push(&self) -> bool {
        push_size_of(self.opcode) > 0
    }

    /// Number of bytes this instruction occupies in the bytecode
    pub fn size(&self) -> usize {
        1 + self.immediate.as_ref().map_or(0, Vec::len)
    }

    /// Byte offset just past this instruction
    pub fn end_pc(&self) -> u32 {
        self.pc + self.size() as u32
    }

    /// The immediate value of a PUSH instruction as a big-endian integer
    pub fn push_value(&self) -> Option<U256> {
        let data = self.immediate.as_deref().filter(|d| !d.is_empty())?;
        U256::try_from_be_slice(data)
    }
}

/// Complete disassembly result for a piece of bytecode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disassembly {
    /// Original bytecode that was disassembled
    pub bytecode: Bytes,
    /// Instructions in ascending `pc` order
    pub instructions: Vec<Instruction>,
}

impl Disassembly {
    /// Get the total number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the bytecode was empty
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Ordinal of the instruction starting exactly at `pc`
    pub fn ordinal_of_pc(&self, pc: u32) -> Option<usize> {
        self.instructions.binary_search_by_key(&pc, |inst| inst.pc).ok()
    }

    /// Get instruction starting exactly at `pc`
    pub fn instruction_at_pc(&self, pc: u32) -> Option<&Instruction> {
        self.ordinal_of_pc(pc).map(|i| &self.instructions[i])
    }

    /// Find the instruction whose bytes cover `pc`
    ///
    /// Useful when `pc` points into the operand of a PUSH.
    pub fn instruction_containing_pc(&self, pc: u32) -> Option<&Instruction> {
        let idx = self.instructions.partition_point(|inst| inst.pc <= pc).checked_sub(1)?;
        let inst = &self.instructions[idx];
        (pc < inst.end_pc()).then_some(inst)
    }

    /// Get all PUSH instructions
    pub fn push_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().filter(|inst| inst.is_push())
    }
}

/// Decode hex bytecode text, with or without a `0x` prefix
pub fn parse_bytecode(code: &str) -> EngineResult<Bytes> {
    let digits = code.trim();
    let digits = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")).unwrap_or(digits);

    if digits.len() % 2 != 0 {
        return Err(EngineError::MalformedBytecode(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }

    hex::decode(digits).map(Bytes::from).map_err(|e| EngineError::MalformedBytecode(e.to_string()))
}

/// Disassemble hex bytecode text
///
/// # Examples
/// ```rust
/// use qdb_engine::utils::disasm::disassemble;
///
/// let result = disassemble("0x6001600201").unwrap();
/// let pcs: Vec<u32> = result.instructions.iter().map(|i| i.pc).collect();
/// assert_eq!(pcs, vec![0, 2, 4]);
/// ```
pub fn disassemble(code: &str) -> EngineResult<Disassembly> {
    parse_bytecode(code).map(|bytes| disassemble_bytes(&bytes))
}

/// Disassemble a raw bytecode buffer
pub fn disassemble_bytes(bytecode: &[u8]) -> Disassembly {
    let mut instructions = Vec::new();
    let mut pc = 0usize;

    while pc < bytecode.len() {
        let opcode = bytecode[pc];
        let push_size = push_size_of(opcode);

        if push_size > 0 {
            let data_start = pc + 1;
            let data_end = (data_start + push_size).min(bytecode.len());
            let data = bytecode[data_start..data_end].to_vec();
            instructions.push(Instruction::with_immediate(pc as u32, opcode, data));
            pc = data_end;
        } else {
            instructions.push(Instruction::new(pc as u32, opcode));
            pc += 1;
        }
    }

    Disassembly { bytecode: Bytes::copy_from_slice(bytecode), instructions }
}

/// Format an instruction as a human-readable string
///
/// With `show_pc` the output is `"000a: PUSH2 0x1234"`, otherwise `"PUSH2 0x1234"`.
pub fn format_instruction(instruction: &Instruction, show_pc: bool) -> String {
    let pc_part = if show_pc { format!("{:04x}: ", instruction.pc) } else { String::new() };

    match instruction.immediate.as_deref() {
        Some(data) if !data.is_empty() => {
            format!("{pc_part}{} 0x{}", instruction.mnemonic, hex::encode(data))
        }
        _ => format!("{pc_part}{}", instruction.mnemonic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdb_common::ensure_test_logging;

    #[test]
    fn test_disassemble_simple() {
        ensure_test_logging(None);
        let result = disassemble_bytes(&[0x80, 0x81, 0x82]); // DUP1, DUP2, DUP3

        assert_eq!(result.len(), 3);
        assert_eq!(result.instructions[0].pc, 0);
        assert_eq!(result.instructions[1].pc, 1);
        assert_eq!(result.instructions[2].pc, 2);

        for inst in &result.instructions {
            assert!(!inst.is_push());
            assert!(inst.immediate.is_none());
        }
    }

    #[test]
    fn test_disassemble_push_add() {
        ensure_test_logging(None);
        let result = disassemble("0x6001600201").unwrap();

        assert_eq!(result.len(), 3);
        let pcs: Vec<u32> = result.instructions.iter().map(|i| i.pc).collect();
        assert_eq!(pcs, vec![0, 2, 4]);
        assert_eq!(result.instructions[0].mnemonic, "PUSH1");
        assert_eq!(result.instructions[0].immediate, Some(vec![0x01]));
        assert_eq!(result.instructions[1].immediate, Some(vec![0x02]));
        assert_eq!(result.instructions[2].mnemonic, "ADD");
        assert_eq!(result.instructions[2].immediate, None);
    }

    #[test]
    fn test_prefix_is_optional() {
        ensure_test_logging(None);
        assert_eq!(disassemble("6001600201").unwrap(), disassemble("0x6001600201").unwrap());
    }

    #[test]
    fn test_odd_length_is_malformed() {
        ensure_test_logging(None);
        assert!(matches!(disassemble("0x600"), Err(EngineError::MalformedBytecode(_))));
        assert!(matches!(disassemble("zz"), Err(EngineError::MalformedBytecode(_))));
    }

    #[test]
    fn test_unknown_opcodes_are_emitted() {
        ensure_test_logging(None);
        let result = disassemble("0c0d").unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.instructions[0].mnemonic, "UNKNOWN(0x0c)");
        assert_eq!(result.instructions[1].mnemonic, "UNKNOWN(0x0d)");
        assert_eq!(result.instructions[1].pc, 1);
    }

    #[test]
    fn test_push0_is_single_byte() {
        ensure_test_logging(None);
        let result = disassemble("5f5f01").unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.instructions[0].mnemonic, "PUSH0");
        assert_eq!(result.instructions[0].size(), 1);
        assert!(!result.instructions[0].is_push());
    }

    #[test]
    fn test_truncated_push_keeps_present_bytes() {
        ensure_test_logging(None);
        let result = disassemble_bytes(&[0x61, 0x12]); // PUSH2 with one operand byte

        assert_eq!(result.len(), 1);
        assert!(result.instructions[0].is_push());
        assert_eq!(result.instructions[0].immediate, Some(vec![0x12]));
        assert_eq!(result.instructions[0].size(), 2);
    }

    #[test]
    fn test_byte_accounting_is_exact() {
        ensure_test_logging(None);
        // Deterministic pseudo-random buffers, including truncated pushes at the tail.
        let mut seed = 0x2545_f491_4f6c_dd1du64;
        for len in 0..256usize {
            let bytes: Vec<u8> = (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    seed as u8
                })
                .collect();
            let result = disassemble_bytes(&bytes);

            let total: usize = result.instructions.iter().map(Instruction::size).sum();
            assert_eq!(total, len);

            let mut expected_pc = 0u32;
            for inst in &result.instructions {
                assert_eq!(inst.pc, expected_pc);
                expected_pc = inst.end_pc();
            }
        }
    }

    #[test]
    fn test_push_value() {
        ensure_test_logging(None);
        let push1 = Instruction::with_immediate(0, 0x60, vec![0x42]);
        assert_eq!(push1.push_value(), Some(U256::from(0x42)));

        let push4 = Instruction::with_immediate(0, 0x63, vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(push4.push_value(), Some(U256::from(0x12345678)));

        assert_eq!(Instruction::new(0, 0x01).push_value(), None);
    }

    #[test]
    fn test_instruction_containing_pc() {
        ensure_test_logging(None);
        let result = disassemble_bytes(&[
            0x60, 0x42, // PUSH1 0x42 (PC 0-1)
            0x61, 0x12, 0x34, // PUSH2 0x1234 (PC 2-4)
            0x80, // DUP1 (PC 5)
        ]);

        assert_eq!(result.instruction_containing_pc(0).unwrap().pc, 0);
        assert_eq!(result.instruction_containing_pc(1).unwrap().pc, 0);
        assert_eq!(result.instruction_containing_pc(3).unwrap().pc, 2);
        assert_eq!(result.instruction_containing_pc(4).unwrap().pc, 2);
        assert_eq!(result.instruction_containing_pc(5).unwrap().pc, 5);
        assert!(result.instruction_containing_pc(6).is_none());

        assert!(result.instruction_at_pc(3).is_none());
        assert_eq!(result.ordinal_of_pc(5), Some(2));
        assert_eq!(result.push_instructions().count(), 2);
    }

    #[test]
    fn test_format_instruction() {
        ensure_test_logging(None);
        let push_inst = Instruction::with_immediate(10, 0x61, vec![0x12, 0x34]);

        assert_eq!(format_instruction(&push_inst, true), "000a: PUSH2 0x1234");
        assert_eq!(format_instruction(&push_inst, false), "PUSH2 0x1234");

        let regular_inst = Instruction::new(5, 0x80);
        assert_eq!(format_instruction(&regular_inst, true), "0005: DUP1");
    }
}
