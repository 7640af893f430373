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

//! Source text helpers: byte-offset to line/column mapping and region slicing.

/// Byte offsets of line starts for one source file.
///
/// Built once per registered file so that offset lookups are `O(log n)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTable {
    starts: Vec<usize>,
    len: usize,
}

impl LineTable {
    /// Build the table for `content`. Lines are split on `\n`.
    pub fn new(content: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts, len: content.len() }
    }

    /// Number of lines in the file
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Convert a byte offset into a 1-based line and a 0-based column.
    ///
    /// An offset equal to the content length (end of file) is accepted.
    pub fn position(&self, offset: usize) -> Option<(usize, usize)> {
        if offset > self.len {
            return None;
        }
        let line_idx = self.starts.partition_point(|&start| start <= offset) - 1;
        Some((line_idx + 1, offset - self.starts[line_idx]))
    }
}

/// Get the source string covered by `offset` and `length`.
///
/// Returns `None` if the region lies outside `source` or does not fall on
/// character boundaries.
pub fn source_string_at(source: &str, offset: usize, length: usize) -> Option<&str> {
    source.get(offset..offset.checked_add(length)?)
}
