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

//! RPC method handlers
//!
//! Every method except `qdb_disassemble` takes the session handle as its
//! first positional parameter.

pub mod breakpoint;
pub mod disasm;
pub mod navigation;
pub mod session;

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{types::RpcError, utils::method_not_found};
use crate::{SessionManager, TraceProvider};

/// Method handler for dispatching RPC calls
#[derive(Debug)]
pub struct MethodHandler<P> {
    manager: Arc<SessionManager<P>>,
}

impl<P: TraceProvider> MethodHandler<P> {
    /// Create a handler serving the sessions of `manager`.
    pub fn new(manager: Arc<SessionManager<P>>) -> Self {
        Self { manager }
    }

    /// The session manager behind this handler
    pub fn manager(&self) -> &Arc<SessionManager<P>> {
        &self.manager
    }

    /// Handle an RPC method call
    pub async fn handle_method(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        debug!("Handling RPC method: {method}");

        let manager = &self.manager;
        match method {
            // Session lifecycle
            "qdb_openSession" => session::open_session(manager, &params).await,
            "qdb_closeSession" => session::close_session(manager, &params),
            "qdb_snapshot" => session::snapshot(manager, &params),

            // Navigation
            "qdb_stepInto" => navigation::step_into(manager, &params),
            "qdb_stepOver" => navigation::step_over(manager, &params),
            "qdb_stepOut" => navigation::step_out(manager, &params),
            "qdb_stepBack" => navigation::step_back(manager, &params),
            "qdb_continueToEnd" => navigation::continue_to_end(manager, &params),
            "qdb_reset" => navigation::reset(manager, &params),
            "qdb_jumpToStep" => navigation::jump_to_step(manager, &params),

            // Breakpoints
            "qdb_jumpToBreakpoint" => breakpoint::jump_to_breakpoint(manager, &params),
            "qdb_jumpToPreviousBreakpoint" => {
                breakpoint::jump_to_previous_breakpoint(manager, &params)
            }
            "qdb_addBreakpoint" => breakpoint::add_breakpoint(manager, &params),
            "qdb_removeBreakpoint" => breakpoint::remove_breakpoint(manager, &params),
            "qdb_listBreakpoints" => breakpoint::list_breakpoints(manager, &params),
            "qdb_clearBreakpoints" => breakpoint::clear_breakpoints(manager, &params),
            "qdb_continueToBreakpoint" => breakpoint::continue_to_breakpoint(manager, &params),
            "qdb_reverseToBreakpoint" => breakpoint::reverse_to_breakpoint(manager, &params),

            // Bytecode
            "qdb_disassemble" => disasm::disassemble(manager.registry(), &params),

            _ => Err(method_not_found(method)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        registry::tests::{counter_artifact, COUNTER},
        rpc::error_codes,
        ContractRegistry, StaticTraceProvider, TransactionReceipt,
    };
    use alloy_primitives::{b256, Bytes, TxHash};
    use qdb_common::{
        ensure_test_logging,
        types::{Trace, TraceStep},
    };
    use serde_json::json;

    pub(crate) const TX: TxHash =
        b256!("0x2222222222222222222222222222222222222222222222222222222222222222");

    /// A handler over the four-step counter transaction.
    pub(crate) fn counter_handler() -> MethodHandler<StaticTraceProvider> {
        let registry = Arc::new(ContractRegistry::new());
        registry.register(COUNTER, &counter_artifact()).unwrap();
        let trace = Trace::from(vec![
            TraceStep::new(0, 0, "PUSH1"),
            TraceStep::new(1, 2, "PUSH1").with_stack(["0x1"]),
            TraceStep::new(2, 4, "ADD").with_stack(["0x1", "0x2"]),
            TraceStep::new(3, 5, "STOP").with_stack(["0x3"]),
        ]);
        let receipt = TransactionReceipt {
            status: true,
            to: Some(COUNTER),
            input: Bytes::new(),
            ..Default::default()
        };
        let provider = StaticTraceProvider::new().with_transaction(TX, trace, receipt);
        MethodHandler::new(Arc::new(SessionManager::new(Arc::new(provider), registry)))
    }

    #[tokio::test]
    async fn test_unknown_method() {
        ensure_test_logging(None);
        let handler = counter_handler();
        let err = handler.handle_method("qdb_fly", None).await.unwrap_err();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_round() {
        ensure_test_logging(None);
        let handler = counter_handler();
        let handle = handler.handle_method("qdb_openSession", Some(json!([TX]))).await.unwrap();

        let snap = handler.handle_method("qdb_stepInto", Some(json!([handle]))).await.unwrap();
        assert_eq!(snap["step"], 1);
        assert_eq!(snap["total_steps"], 4);

        let snap = handler.handle_method("qdb_jumpToStep", Some(json!([handle, 3]))).await.unwrap();
        assert_eq!(snap["opcode"], "STOP");

        let err = handler
            .handle_method("qdb_jumpToStep", Some(json!([handle, 4])))
            .await
            .unwrap_err();
        assert_eq!(err.code, error_codes::STEP_OUT_OF_BOUNDS);

        let closed = handler.handle_method("qdb_closeSession", Some(json!([handle]))).await.unwrap();
        assert_eq!(closed, json!(true));
        let err = handler.handle_method("qdb_snapshot", Some(json!([handle]))).await.unwrap_err();
        assert_eq!(err.code, error_codes::UNKNOWN_SESSION);
    }
}
