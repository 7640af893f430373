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

//! Decoder for the compact, delta-encoded compiler source map.
//!
//! A source map is a `;`-separated list with one entry per instruction. Each
//! entry is `offset:length:file_index:jump[:modifier_depth]`. Any field left
//! blank, as well as fields missing off the end of an entry, repeat the value
//! of the previous entry. The very first entry inherits from
//! `(-1, -1, -1, '-', 0)`.

use qdb_common::types::{JumpKind, SourceMapEntry};
use tracing::trace;

use crate::{EngineError, EngineResult};

/// Decode a compressed source map into one entry per instruction.
///
/// An empty string decodes to zero entries.
///
/// # Examples
/// ```rust
/// use qdb_common::types::JumpKind;
/// use qdb_engine::analysis::decode_source_map;
///
/// let entries = decode_source_map("0:1:0:-;2:1:0:-;:::").unwrap();
/// assert_eq!(entries.len(), 3);
/// assert_eq!(entries[2], entries[1]);
/// assert_eq!(entries[2].jump_kind, JumpKind::Regular);
/// ```
pub fn decode_source_map(source_map: &str) -> EngineResult<Vec<SourceMapEntry>> {
    let source_map = source_map.trim();
    if source_map.is_empty() {
        return Ok(Vec::new());
    }

    let mut current = SourceMapEntry::default();
    let mut entries = Vec::with_capacity(source_map.len() / 8);

    for (ordinal, raw) in source_map.split(';').enumerate() {
        let mut fields = raw.split(':');

        if let Some(offset) = parse_field(ordinal, fields.next())? {
            current.offset = offset;
        }
        if let Some(length) = parse_field(ordinal, fields.next())? {
            current.length = length;
        }
        if let Some(file_index) = parse_field(ordinal, fields.next())? {
            current.file_index = file_index;
        }
        if let Some(jump) = fields.next().map(str::trim).filter(|f| !f.is_empty()) {
            current.jump_kind = JumpKind::from_marker(jump);
        }
        if let Some(modifier_depth) = parse_field(ordinal, fields.next())? {
            current.modifier_depth = modifier_depth;
        }

        entries.push(current);
    }

    trace!(entries = entries.len(), "decoded source map");
    Ok(entries)
}

/// Parse one numeric field; `None` means "inherit".
fn parse_field(entry: usize, field: Option<&str>) -> EngineResult<Option<i32>> {
    let Some(field) = field.map(str::trim).filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    field
        .parse::<i32>()
        .map(Some)
        .map_err(|_| EngineError::MalformedSourceMap { entry, field: field.to_string() })
}
