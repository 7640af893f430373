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

//! QDB Engine - trace analysis and navigation
//!
//! Turns a recorded execution trace plus compiler output into a navigable
//! debugging session:
//!
//! - [`utils::disasm`] splits bytecode into instructions
//! - [`analysis`] decodes source maps, indexes instructions by pc and derives
//!   call depths and call stacks from the trace
//! - [`registry`] holds compiled contracts and their instruction indexes
//! - [`session`] moves a cursor over the trace and projects snapshots
//! - [`provider`] fetches traces and receipts from a node
//! - [`rpc`] exposes sessions over JSON-RPC

pub mod analysis;
pub use analysis::*;

pub mod core;
pub use core::*;

pub mod error;
pub use error::*;

pub mod provider;
pub use provider::*;

pub mod registry;
pub use registry::*;

pub mod rpc;
pub use rpc::*;

pub mod session;
pub use session::*;

pub mod utils;
pub use utils::*;
