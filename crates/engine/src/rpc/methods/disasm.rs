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

//! Bytecode RPC methods.
//!
//! `qdb_disassemble` takes either raw code or a registered contract:
//!
//! ```json
//! {"method": "qdb_disassemble", "params": [{"code": "0x6001600201"}]}
//! {"method": "qdb_disassemble", "params": [{"address": "0x...", "kind": "Creation"}]}
//! ```
//!
//! and returns one object per instruction with its pc, opcode byte,
//! mnemonic, immediate bytes and formatted text.

use alloy_primitives::{Address, Bytes};
use qdb_common::types::CodeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    disassemble as disassemble_hex, format_instruction,
    rpc::{
        types::RpcError,
        utils::{engine_error, invalid_params, param, to_json},
    },
    ContractRegistry, Disassembly, Instruction,
};

/// What to disassemble
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DisassembleTarget {
    Code { code: String },
    Contract { address: Address, kind: Option<CodeKind> },
}

/// One disassembled instruction as returned over RPC
#[derive(Debug, Serialize)]
struct InstructionView {
    pc: u32,
    opcode: u8,
    mnemonic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    immediate: Option<Bytes>,
    text: String,
}

impl From<&Instruction> for InstructionView {
    fn from(instruction: &Instruction) -> Self {
        Self {
            pc: instruction.pc,
            opcode: instruction.opcode,
            mnemonic: instruction.mnemonic.clone(),
            immediate: instruction.immediate.clone().map(Bytes::from),
            text: format_instruction(instruction, true),
        }
    }
}

fn render(disassembly: &Disassembly) -> Result<Value, RpcError> {
    let views: Vec<InstructionView> =
        disassembly.instructions.iter().map(InstructionView::from).collect();
    to_json(&views)
}

/// `qdb_disassemble [target]`
pub fn disassemble(
    registry: &ContractRegistry,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let target: DisassembleTarget = param(params, 0, "code or contract")
        .map_err(|_| invalid_params("Invalid params: expected [{code}] or [{address, kind?}]"))?;

    match target {
        DisassembleTarget::Code { code } => render(&disassemble_hex(&code).map_err(engine_error)?),
        DisassembleTarget::Contract { address, kind } => {
            let index =
                registry.index(address, kind.unwrap_or(CodeKind::Runtime)).map_err(engine_error)?;
            render(index.disassembly())
        }
    }
}
