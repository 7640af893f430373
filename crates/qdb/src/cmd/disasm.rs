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

//! Disassembler command

use std::{fs, path::Path};

use eyre::{eyre, Context, Result};
use itertools::Itertools;
use qdb_engine::{disassemble, format_instruction};

/// Render bytecode as one instruction per line.
pub fn render_disassembly(code: &str, show_pc: bool) -> Result<String> {
    let disassembly = disassemble(code)?;
    Ok(disassembly
        .instructions
        .iter()
        .map(|instruction| format_instruction(instruction, show_pc))
        .join("\n"))
}

/// Disassemble hex given inline or in a file and print it.
pub fn disassemble_command(code: Option<&str>, file: Option<&Path>, show_pc: bool) -> Result<()> {
    let code = match (code, file) {
        (Some(code), _) => code.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read bytecode file: {}", path.display()))?,
        (None, None) => return Err(eyre!("no bytecode given, pass HEX or --file PATH")),
    };

    let listing = render_disassembly(code.trim(), show_pc)?;
    if !listing.is_empty() {
        println!("{listing}");
    }
    Ok(())
}
