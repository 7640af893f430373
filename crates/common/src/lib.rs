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

//! QDB Common - Shared types for QDB components
//!
//! This crate provides the data model shared by the debugging engine and the
//! command-line front end: raw trace steps, decoded source-map entries, call
//! frames, breakpoints and debugging snapshots, together with opcode
//! classification and logging setup.

/// Common types used throughout the QDB ecosystem including trace steps, source locations, call frames and snapshots
pub mod types;

/// Logging setup and utilities for consistent logging across QDB components
pub mod logging;
/// Opcode classification used to reconstruct call frames from an opcode stream
pub mod opcode;

pub use logging::*;
pub use opcode::*;
