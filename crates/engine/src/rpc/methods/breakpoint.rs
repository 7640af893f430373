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

//! Breakpoint RPC methods.
//!
//! Breakpoints are `{"file": "...", "line": N}` objects.
//!
//! ```json
//! // Request
//! {"jsonrpc": "2.0", "method": "qdb_jumpToBreakpoint",
//!  "params": [1, {"file": "Counter.sol", "line": 4}], "id": 1}
//!
//! // Response
//! {"jsonrpc": "2.0", "result": {"found": true, "snapshot": {...}}, "id": 1}
//! ```

use qdb_common::types::{Breakpoint, BreakpointHit};
use serde_json::Value;
use tracing::debug;

use crate::{
    rpc::{
        types::RpcError,
        utils::{engine_error, param, to_json},
    },
    EngineResult, SessionHandle, SessionManager, TraceProvider,
};

fn search<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
    op: impl FnOnce(&SessionManager<P>, SessionHandle) -> EngineResult<BreakpointHit>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    let hit = op(manager, handle).map_err(engine_error)?;
    debug!(%handle, found = hit.found, step = hit.snapshot.step, "breakpoint search");
    to_json(&hit)
}

/// `qdb_jumpToBreakpoint [handle, breakpoint]`: forward scan for one location.
pub fn jump_to_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let bp: Breakpoint = param(params, 1, "breakpoint")?;
    search(manager, params, |manager, handle| {
        manager.jump_to_breakpoint(handle, bp.line, &bp.file)
    })
}

/// `qdb_jumpToPreviousBreakpoint [handle, breakpoint]`: backward scan for one location.
pub fn jump_to_previous_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let bp: Breakpoint = param(params, 1, "breakpoint")?;
    search(manager, params, |manager, handle| {
        manager.jump_to_previous_breakpoint(handle, bp.line, &bp.file)
    })
}

/// `qdb_continueToBreakpoint [handle]`
pub fn continue_to_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    search(manager, params, SessionManager::continue_to_breakpoint)
}

/// `qdb_reverseToBreakpoint [handle]`
pub fn reverse_to_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    search(manager, params, SessionManager::reverse_to_breakpoint)
}

/// `qdb_addBreakpoint [handle, breakpoint]`
pub fn add_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    let bp: Breakpoint = param(params, 1, "breakpoint")?;
    to_json(&manager.add_breakpoint(handle, bp).map_err(engine_error)?)
}

/// `qdb_removeBreakpoint [handle, breakpoint]`
pub fn remove_breakpoint<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    let bp: Breakpoint = param(params, 1, "breakpoint")?;
    to_json(&manager.remove_breakpoint(handle, &bp).map_err(engine_error)?)
}

/// `qdb_listBreakpoints [handle]`
pub fn list_breakpoints<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    to_json(&manager.breakpoints(handle).map_err(engine_error)?)
}

/// `qdb_clearBreakpoints [handle]`
pub fn clear_breakpoints<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    manager.clear_breakpoints(handle).map_err(engine_error)?;
    Ok(Value::Null)
}
