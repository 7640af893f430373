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

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// How control flow enters or leaves the instruction a source-map entry describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpKind {
    /// Jump into a function (`i`)
    Into,
    /// Return out of a function (`o`)
    Out,
    /// Ordinary jump or no jump at all (`-`)
    #[default]
    Regular,
}

impl JumpKind {
    /// Map the source-map character to a jump kind. Anything but `i`/`o` is regular.
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "i" => Self::Into,
            "o" => Self::Out,
            _ => Self::Regular,
        }
    }

    /// The character used for this kind in the compact source-map format.
    pub fn marker(&self) -> char {
        match self {
            Self::Into => 'i',
            Self::Out => 'o',
            Self::Regular => '-',
        }
    }
}

/// One decoded source-map entry, describing the source region of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Byte offset of the region in the source file, `-1` if unmapped
    pub offset: i32,
    /// Byte length of the region
    pub length: i32,
    /// Index of the source file, `-1` if unmapped
    pub file_index: i32,
    /// Jump annotation
    pub jump_kind: JumpKind,
    /// Modifier nesting depth
    #[serde(default)]
    pub modifier_depth: i32,
}

impl Default for SourceMapEntry {
    fn default() -> Self {
        Self { offset: -1, length: -1, file_index: -1, jump_kind: JumpKind::Regular, modifier_depth: 0 }
    }
}

impl SourceMapEntry {
    /// Whether this entry points at a real source region.
    ///
    /// Compiler-generated code carries `file_index == -1` or `offset == -1`.
    pub fn is_mapped(&self) -> bool {
        self.file_index >= 0 && self.offset >= 0
    }
}

/// A source region resolved to a file path and a line/column position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file index from the source map
    pub file_index: u32,
    /// Path of the source file
    pub path: PathBuf,
    /// Byte offset of the region
    pub offset: u32,
    /// Byte length of the region
    pub length: u32,
    /// 1-based line of the region start
    pub line: usize,
    /// 0-based column of the region start
    pub column: usize,
    /// Jump annotation carried over from the source map
    pub jump_kind: JumpKind,
}

impl SourceLocation {
    /// Whether this location sits on the given file and line.
    pub fn is_at(&self, path: &std::path::Path, line: usize) -> bool {
        self.line == line && self.path == path
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_kind_markers() {
        assert_eq!(JumpKind::from_marker("i"), JumpKind::Into);
        assert_eq!(JumpKind::from_marker("o"), JumpKind::Out);
        assert_eq!(JumpKind::from_marker("-"), JumpKind::Regular);
        assert_eq!(JumpKind::from_marker("x"), JumpKind::Regular);
        assert_eq!(JumpKind::Out.marker(), 'o');
    }

    #[test]
    fn test_unmapped_entries() {
        assert!(!SourceMapEntry::default().is_mapped());

        let injected = SourceMapEntry { offset: 10, length: 2, file_index: -1, ..Default::default() };
        assert!(!injected.is_mapped());

        let mapped = SourceMapEntry { offset: 0, length: 1, file_index: 0, ..Default::default() };
        assert!(mapped.is_mapped());
    }

    #[test]
    fn test_location_display() {
        let loc = SourceLocation {
            file_index: 0,
            path: PathBuf::from("src/A.sol"),
            offset: 12,
            length: 4,
            line: 3,
            column: 4,
            jump_kind: JumpKind::Regular,
        };
        assert_eq!(loc.to_string(), "src/A.sol:3:5");
        assert!(loc.is_at(std::path::Path::new("src/A.sol"), 3));
        assert!(!loc.is_at(std::path::Path::new("A.sol"), 3));
    }
}
