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

//! Navigation RPC methods.
//!
//! Each method moves the cursor of the session named by its first parameter
//! and returns the resulting snapshot.

use serde_json::Value;

use crate::{
    rpc::{
        types::RpcError,
        utils::{engine_error, param, to_json},
    },
    EngineResult, SessionHandle, SessionManager, TraceProvider,
};
use qdb_common::types::DebugSnapshot;

fn navigate<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
    op: impl FnOnce(&SessionManager<P>, SessionHandle) -> EngineResult<DebugSnapshot>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    to_json(&op(manager, handle).map_err(engine_error)?)
}

/// `qdb_stepInto [handle]`
pub fn step_into<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::step_into)
}

/// `qdb_stepOver [handle]`
pub fn step_over<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::step_over)
}

/// `qdb_stepOut [handle]`
pub fn step_out<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::step_out)
}

/// `qdb_stepBack [handle]`
pub fn step_back<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::step_back)
}

/// `qdb_continueToEnd [handle]`
pub fn continue_to_end<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::continue_to_end)
}

/// `qdb_reset [handle]`
pub fn reset<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    navigate(manager, params, SessionManager::reset)
}

/// `qdb_jumpToStep [handle, step]`
pub fn jump_to_step<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let step: u32 = param(params, 1, "step")?;
    navigate(manager, params, |manager, handle| manager.jump_to_step(handle, step))
}
