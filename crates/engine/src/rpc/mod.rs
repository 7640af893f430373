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

//! JSON-RPC server for debugging control and inspection.
//!
//! Front ends drive debugging sessions through this interface: open a
//! session for a transaction, move its cursor, manage breakpoints and read
//! back [`DebugSnapshot`](qdb_common::types::DebugSnapshot)s.
//!
//! - **Server** ([`server`]) - HTTP server handling client connections
//! - **Methods** ([`methods`]) - RPC method implementations organized by functionality
//! - **Types** ([`types`]) - Request/response data structures and protocol types
//! - **Utils** ([`utils`]) - Common utilities for RPC operations
//!
//! ```rust,ignore
//! use qdb_engine::{rpc::start_debug_server, SessionManager};
//!
//! let manager = Arc::new(SessionManager::new(provider, registry));
//! let handle = start_debug_server(manager, Some(3000)).await?;
//! ```

pub mod methods;
pub mod server;
pub mod types;
pub mod utils;

pub use server::*;
pub use types::*;
