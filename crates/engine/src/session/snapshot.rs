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

//! Session state projection.
//!
//! A [`DebugSnapshot`] is a pure function of the session's trace, derived
//! call depths, code owners and the contract registry at the cursor. Building
//! one never mutates the session.

use qdb_common::types::DebugSnapshot;

use super::DebugSession;

/// Project the externally visible state of `session` at its cursor.
///
/// `source_location` is `None` when the current instruction has no source
/// region (compiler-generated code, or a contract without registered
/// sources). Front ends show the raw opcode and pc in that case.
pub fn snapshot(session: &DebugSession) -> DebugSnapshot {
    let step = session.current_step();

    DebugSnapshot {
        step: session.cursor(),
        total_steps: session.total_steps(),
        pc: step.pc,
        opcode: step.opcode_name.clone(),
        call_depth: session.current_depth(),
        gas_left: step.gas_left,
        source_location: session.current_source_location(),
        call_stack: session.call_stack(),
        stack: step.stack.clone(),
        memory: step.memory.clone(),
        storage: step.storage_delta.clone(),
    }
}

impl DebugSession {
    /// Snapshot of the session at its cursor
    pub fn snapshot(&self) -> DebugSnapshot {
        snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use alloy_primitives::{Bytes, TxHash};
    use qdb_common::{
        ensure_test_logging,
        types::{CallKind, Trace, TraceStep},
    };

    use super::*;
    use crate::{
        analysis::RootFrame,
        registry::tests::{counter_artifact, COUNTER},
        ContractRegistry,
    };

    fn session() -> DebugSession {
        let registry = Arc::new(ContractRegistry::new());
        registry.register(COUNTER, &counter_artifact()).unwrap();

        let mut add_step = TraceStep::new(2, 4, "ADD").with_stack(["0x1", "0x2"]);
        add_step.storage_delta.insert("0x0".into(), "0x3".into());
        add_step.gas_left = 21_000;
        let trace = Trace::from(vec![
            TraceStep::new(0, 0, "PUSH1"),
            TraceStep::new(1, 2, "PUSH1").with_stack(["0x1"]),
            add_step,
            TraceStep::new(3, 5, "STOP"),
        ]);

        DebugSession::new(
            TxHash::ZERO,
            Arc::new(trace),
            RootFrame::call(COUNTER, Bytes::new()),
            registry,
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_reports_jump_target() {
        ensure_test_logging(None);
        let mut session = session();
        for n in 0..session.total_steps() {
            session.jump_to_step(n).unwrap();
            assert_eq!(snapshot(&session).step, n);
        }
    }

    #[test]
    fn test_snapshot_contents() {
        ensure_test_logging(None);
        let mut session = session();
        session.jump_to_step(2).unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.total_steps, 4);
        assert_eq!(snap.pc, 4);
        assert_eq!(snap.opcode, "ADD");
        assert_eq!(snap.call_depth, 0);
        assert_eq!(snap.gas_left, 21_000);
        assert_eq!(snap.stack, vec!["0x1".to_string(), "0x2".to_string()]);
        assert_eq!(snap.storage.get("0x0").map(String::as_str), Some("0x3"));

        let loc = snap.source_location.unwrap();
        assert_eq!((loc.path, loc.line), (PathBuf::from("Counter.sol"), 4));

        assert_eq!(snap.call_stack.len(), 1);
        assert_eq!(snap.call_stack[0].call_kind, CallKind::Root);
        assert_eq!(snap.call_stack[0].address, Some(COUNTER));
    }

    #[test]
    fn test_unmapped_step_has_no_location() {
        ensure_test_logging(None);
        let mut session = session();
        session.continue_to_end();

        let snap = session.snapshot();
        assert_eq!(snap.source_location, None);
        assert_eq!(snap.opcode, "STOP");
        assert!(snap.is_last());
    }

    #[test]
    fn test_snapshot_does_not_move_cursor() {
        ensure_test_logging(None);
        let mut session = session();
        session.jump_to_step(1).unwrap();
        let first = session.snapshot();
        let second = session.snapshot();
        assert_eq!(first, second);
        assert_eq!(session.cursor(), 1);
    }
}
