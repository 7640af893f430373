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

use std::{fmt::Display, path::PathBuf, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

use super::SourceLocation;

/// A `(file, line)` search target used when scanning a trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Breakpoint {
    /// Path of the source file, as registered with the contract's sources.
    pub file: PathBuf,
    /// Line number in the source file (1-based).
    pub line: usize,
}

impl Breakpoint {
    /// Creates a new breakpoint at the given file and line.
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self { file: file.into(), line }
    }

    /// Whether a resolved source location hits this breakpoint.
    pub fn matches(&self, location: &SourceLocation) -> bool {
        location.is_at(&self.file, self.line)
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

impl FromStr for Breakpoint {
    type Err = Error;

    /// Parses a breakpoint from a string.
    /// Format: `[@]<path>:<line>`
    /// Examples:
    /// - `src/Token.sol:42`
    /// - `@A.sol:10`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();

        let Some((path, line)) = trimmed.rsplit_once(':') else {
            bail!("Invalid breakpoint format. Expected <path>:<line>, got: {s}");
        };

        let path = path.trim();
        if path.is_empty() {
            bail!("Breakpoint path is empty");
        }

        let line = line.trim().parse::<usize>().map_err(|e| eyre!("Invalid line number: {e}"))?;
        if line == 0 {
            bail!("Line numbers start at 1");
        }

        Ok(Self::new(path, line))
    }
}
