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

//! Session lifecycle RPC methods.
//!
//! - `qdb_openSession [tx_hash]` - returns the new session handle
//! - `qdb_closeSession [handle]` - returns whether a session was closed
//! - `qdb_snapshot [handle]` - returns the snapshot at the cursor

use alloy_primitives::TxHash;
use serde_json::Value;
use tracing::debug;

use crate::{
    rpc::{
        types::RpcError,
        utils::{engine_error, param, to_json},
    },
    SessionHandle, SessionManager, TraceProvider,
};

/// Open a session for the transaction in the first parameter.
pub async fn open_session<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let tx_hash: TxHash = param(params, 0, "transaction hash")?;
    let handle = manager.open_session(tx_hash).await.map_err(engine_error)?;
    debug!(%handle, %tx_hash, "opened session over RPC");
    to_json(&handle)
}

/// Close the session named by the first parameter.
pub fn close_session<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    to_json(&manager.close_session(handle))
}

/// Snapshot of the session named by the first parameter.
pub fn snapshot<P: TraceProvider>(
    manager: &SessionManager<P>,
    params: &Option<Value>,
) -> Result<Value, RpcError> {
    let handle: SessionHandle = param(params, 0, "session handle")?;
    to_json(&manager.snapshot(handle).map_err(engine_error)?)
}
