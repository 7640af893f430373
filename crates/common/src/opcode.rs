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

use revm::bytecode::OpCode;
use serde::{Deserialize, Serialize};

/// How an executed opcode affects the call structure of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpcodeClass {
    /// Message call into another frame (`CALL`, `CALLCODE`, `DELEGATECALL`, `STATICCALL`)
    Call,
    /// Contract creation (`CREATE`, `CREATE2`)
    Create,
    /// Leaves the current frame (`STOP`, `RETURN`, `REVERT`, `SELFDESTRUCT`, `INVALID`)
    Halt,
    /// Everything else
    Other,
}

impl OpcodeClass {
    /// Classify an opcode mnemonic as reported by a tracer.
    ///
    /// Tracers disagree on the spelling of a few opcodes (`SUICIDE` on old
    /// nodes, `opcode 0xfe not defined` for invalid ones), both are handled.
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        match mnemonic.trim() {
            "CALL" | "CALLCODE" | "DELEGATECALL" | "STATICCALL" => Self::Call,
            "CREATE" | "CREATE2" => Self::Create,
            "STOP" | "RETURN" | "REVERT" | "SELFDESTRUCT" | "SUICIDE" | "INVALID" => Self::Halt,
            other if other.starts_with("opcode 0x") && other.ends_with("not defined") => Self::Halt,
            _ => Self::Other,
        }
    }

    /// Whether the opcode opens a new frame.
    pub fn enters_frame(&self) -> bool {
        matches!(self, Self::Call | Self::Create)
    }

    /// Whether the opcode closes the current frame.
    pub fn exits_frame(&self) -> bool {
        matches!(self, Self::Halt)
    }
}

/// Mnemonic of a raw opcode byte, `UNKNOWN(0xNN)` for unassigned values.
pub fn mnemonic_of(byte: u8) -> String {
    match OpCode::new(byte) {
        Some(op) => op.as_str().to_string(),
        None => format!("UNKNOWN(0x{byte:02x})"),
    }
}

/// Number of immediate bytes following a `PUSHn` opcode byte (0 for anything else).
pub fn push_size_of(byte: u8) -> usize {
    if (0x60..=0x7f).contains(&byte) {
        (byte - 0x60 + 1) as usize
    } else {
        0
    }
}

/// Extended trait for EVM opcode analysis
///
/// Provides the call-structure view of an opcode used when reconstructing
/// call depth and call stacks from a trace.
pub trait OpcodeTr {
    /// How the opcode affects the call structure
    ///
    /// # Example
    /// ```rust
    /// use revm::bytecode::OpCode;
    /// use qdb_common::{OpcodeClass, OpcodeTr};
    ///
    /// assert_eq!(OpCode::DELEGATECALL.class(), OpcodeClass::Call);
    /// assert_eq!(OpCode::REVERT.class(), OpcodeClass::Halt);
    /// assert_eq!(OpCode::ADD.class(), OpcodeClass::Other);
    /// ```
    fn class(&self) -> OpcodeClass;

    /// Check if this opcode is a call instruction (message call or creation)
    fn is_call(&self) -> bool;

    /// Check if this opcode modifies persistent EVM state
    ///
    /// Storage writes, account creation and destruction, value-bearing calls
    /// and log emission count. Memory and stack do not.
    fn modifies_evm_state(&self) -> bool;
}

impl OpcodeTr for OpCode {
    fn class(&self) -> OpcodeClass {
        match *self {
            Self::CALL | Self::CALLCODE | Self::DELEGATECALL | Self::STATICCALL => {
                OpcodeClass::Call
            }
            Self::CREATE | Self::CREATE2 => OpcodeClass::Create,
            Self::STOP | Self::RETURN | Self::REVERT | Self::SELFDESTRUCT | Self::INVALID => {
                OpcodeClass::Halt
            }
            _ => OpcodeClass::Other,
        }
    }

    fn is_call(&self) -> bool {
        self.class().enters_frame()
    }

    fn modifies_evm_state(&self) -> bool {
        matches!(
            *self,
            Self::SSTORE |
            Self::CREATE | Self::CREATE2 | Self::SELFDESTRUCT |
            Self::CALL | Self::CALLCODE |
            Self::LOG0 | Self::LOG1 | Self::LOG2 | Self::LOG3 | Self::LOG4
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mnemonics() {
        assert_eq!(OpcodeClass::from_mnemonic("CALL"), OpcodeClass::Call);
        assert_eq!(OpcodeClass::from_mnemonic("STATICCALL"), OpcodeClass::Call);
        assert_eq!(OpcodeClass::from_mnemonic("CREATE2"), OpcodeClass::Create);
        assert_eq!(OpcodeClass::from_mnemonic("RETURN"), OpcodeClass::Halt);
        assert_eq!(OpcodeClass::from_mnemonic("SUICIDE"), OpcodeClass::Halt);
        assert_eq!(OpcodeClass::from_mnemonic("opcode 0xfe not defined"), OpcodeClass::Halt);
        assert_eq!(OpcodeClass::from_mnemonic("SSTORE"), OpcodeClass::Other);
    }

    #[test]
    fn test_mnemonic_and_byte_classes_agree() {
        for byte in 0..=u8::MAX {
            if let Some(op) = OpCode::new(byte) {
                assert_eq!(OpcodeClass::from_mnemonic(op.as_str()), op.class(), "{}", op.as_str());
            }
        }
    }

    #[test]
    fn test_mnemonic_of() {
        assert_eq!(mnemonic_of(0x01), "ADD");
        assert_eq!(mnemonic_of(0x60), "PUSH1");
        assert_eq!(mnemonic_of(0x0c), "UNKNOWN(0x0c)");
    }

    #[test]
    fn test_push_size_of() {
        assert_eq!(push_size_of(0x5f), 0);
        assert_eq!(push_size_of(0x60), 1);
        assert_eq!(push_size_of(0x7f), 32);
        assert_eq!(push_size_of(0x80), 0);
    }

    #[test]
    fn test_is_call() {
        assert!(OpCode::CREATE.is_call());
        assert!(OpCode::STATICCALL.is_call());
        assert!(!OpCode::RETURN.is_call());
        assert!(OpCode::SSTORE.modifies_evm_state());
        assert!(!OpCode::MSTORE.modifies_evm_state());
    }
}
