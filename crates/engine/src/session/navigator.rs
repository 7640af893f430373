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

//! The trace navigator.
//!
//! A [`DebugSession`] holds a cursor into a read-only trace together with the
//! derived call depth and code owner of every step. Stepping follows the
//! call-depth structure: stepping over a call skips every step of the callee,
//! stepping out runs until the current frame has returned.

use std::{collections::BTreeSet, path::Path, sync::Arc};

use alloy_primitives::TxHash;
use qdb_common::types::{Breakpoint, BreakpointSearch, CallStack, SourceLocation, Trace, TraceStep};
use tracing::{debug, info};

use crate::{
    analysis::{call_stack_at, derive_call_depths, step_owners, FrameOwner, RootFrame},
    ContractRegistry, EngineError, EngineResult,
};

/// A navigable debugging session over one transaction trace.
#[derive(Debug)]
pub struct DebugSession {
    tx_hash: TxHash,
    trace: Arc<Trace>,
    cursor: u32,
    call_depths: Vec<u32>,
    owners: Vec<FrameOwner>,
    total_steps: u32,
    root: RootFrame,
    registry: Arc<ContractRegistry>,
    breakpoints: BTreeSet<Breakpoint>,
}

/// Scan direction of a breakpoint search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl DebugSession {
    /// Create a session positioned at the first step.
    ///
    /// Fails with [`EngineError::TraceUnavailable`] for an empty trace.
    pub fn new(
        tx_hash: TxHash,
        trace: Arc<Trace>,
        root: RootFrame,
        registry: Arc<ContractRegistry>,
    ) -> EngineResult<Self> {
        if trace.is_empty() {
            return Err(EngineError::trace_unavailable(tx_hash, "trace contains no steps"));
        }

        let call_depths = derive_call_depths(&trace);
        let owners = step_owners(&trace, &call_depths, &root);
        let total_steps = trace.len() as u32;

        info!(%tx_hash, total_steps, max_depth = call_depths.iter().max().copied().unwrap_or(0), "debug session created");

        Ok(Self {
            tx_hash,
            trace,
            cursor: 0,
            call_depths,
            owners,
            total_steps,
            root,
            registry,
            breakpoints: BTreeSet::new(),
        })
    }

    /// Transaction being debugged
    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Current step
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Number of steps in the trace
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Derived call depth of every step
    pub fn call_depths(&self) -> &[u32] {
        &self.call_depths
    }

    /// The trace being navigated
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The root frame of the transaction
    pub fn root(&self) -> &RootFrame {
        &self.root
    }

    /// The registry used for source resolution
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// The step under the cursor
    pub fn current_step(&self) -> &TraceStep {
        &self.trace[self.cursor as usize]
    }

    /// Call depth of the step under the cursor
    pub fn current_depth(&self) -> u32 {
        self.call_depths[self.cursor as usize]
    }

    /// Code owner of a step
    pub fn owner_at(&self, step: u32) -> Option<FrameOwner> {
        self.owners.get(step as usize).copied()
    }

    fn last_step(&self) -> u32 {
        self.total_steps - 1
    }

    fn move_to(&mut self, step: u32, op: &str) -> u32 {
        debug!(op, from = self.cursor, to = step, "navigate");
        self.cursor = step;
        step
    }

    /// Advance one step. No-op on the last step.
    pub fn step_into(&mut self) -> u32 {
        let next = (self.cursor + 1).min(self.last_step());
        self.move_to(next, "step_into")
    }

    /// Go back one step. No-op on the first step.
    pub fn step_back(&mut self) -> u32 {
        let prev = self.cursor.saturating_sub(1);
        self.move_to(prev, "step_back")
    }

    /// Advance past any call made at the current depth.
    ///
    /// Lands on the first later step whose depth is not greater than the
    /// current one, or on the last step if there is none.
    pub fn step_over(&mut self) -> u32 {
        let depth = self.current_depth();
        let mut cursor = self.cursor as usize;

        while cursor + 1 < self.total_steps as usize && self.call_depths[cursor + 1] > depth {
            cursor += 1;
        }
        let target = (cursor + 1).min(self.last_step() as usize) as u32;

        self.move_to(target, "step_over")
    }

    /// Run until the current frame has returned.
    ///
    /// Lands on the first later step with a smaller depth, or on the last step
    /// if there is none.
    pub fn step_out(&mut self) -> u32 {
        let depth = self.current_depth();
        let start = self.cursor as usize + 1;

        let target = self.call_depths[start.min(self.call_depths.len())..]
            .iter()
            .position(|&d| d < depth)
            .map(|offset| (start + offset) as u32)
            .unwrap_or_else(|| self.last_step());

        self.move_to(target, "step_out")
    }

    /// Move to the last step.
    pub fn continue_to_end(&mut self) -> u32 {
        let last = self.last_step();
        self.move_to(last, "continue_to_end")
    }

    /// Move to the first step.
    pub fn reset(&mut self) -> u32 {
        self.move_to(0, "reset")
    }

    /// Move to step `n`.
    ///
    /// Fails with [`EngineError::OutOfRange`] if `n` is past the trace; the
    /// cursor is left unchanged.
    pub fn jump_to_step(&mut self, n: u32) -> EngineResult<u32> {
        if n >= self.total_steps {
            return Err(EngineError::OutOfRange { index: n, total: self.total_steps });
        }
        Ok(self.move_to(n, "jump_to_step"))
    }

    /// Resolved source location of a step
    pub fn location_at(&self, step: u32) -> Option<SourceLocation> {
        let owner = self.owner_at(step)?;
        let pc = self.trace.get(step as usize)?.pc;
        self.registry.location_at(&owner, pc)
    }

    /// Resolved source location of the step under the cursor
    pub fn current_source_location(&self) -> Option<SourceLocation> {
        self.location_at(self.cursor)
    }

    /// Source text covered by the current location
    pub fn source_text(&self) -> Option<String> {
        let location = self.current_source_location()?;
        let owner = self.owner_at(self.cursor)?;
        self.registry.source_text(&owner, &location)
    }

    /// Call stack in effect at the cursor
    pub fn call_stack(&self) -> CallStack {
        call_stack_at(
            &self.trace,
            &self.call_depths,
            self.cursor as usize,
            &self.root,
            self.registry.as_ref(),
        )
    }

    /// Scan from the cursor for the nearest step accepted by `hit`.
    fn search<F>(&mut self, direction: Direction, op: &str, hit: F) -> BreakpointSearch
    where
        F: Fn(&SourceLocation) -> bool,
    {
        let matches = |step: &u32| self.location_at(*step).is_some_and(|loc| hit(&loc));
        let found = match direction {
            Direction::Forward => (self.cursor + 1..self.total_steps).find(matches),
            Direction::Backward => (0..self.cursor).rev().find(matches),
        };

        match found {
            Some(step) => {
                self.move_to(step, op);
                BreakpointSearch { found: true, step }
            }
            None => {
                debug!(op, cursor = self.cursor, "no matching step");
                BreakpointSearch { found: false, step: self.cursor }
            }
        }
    }

    /// Move forward to the next step on `file:line`.
    ///
    /// Not finding one is a normal outcome: the cursor stays put and the
    /// result reports `found: false`.
    pub fn jump_to_breakpoint(&mut self, line: usize, file: &Path) -> BreakpointSearch {
        self.search(Direction::Forward, "jump_to_breakpoint", |loc| loc.is_at(file, line))
    }

    /// Move backward to the previous step on `file:line`.
    pub fn jump_to_previous_breakpoint(&mut self, line: usize, file: &Path) -> BreakpointSearch {
        self.search(Direction::Backward, "jump_to_previous_breakpoint", |loc| loc.is_at(file, line))
    }

    /// Add a breakpoint. Returns `false` if it was already set.
    pub fn add_breakpoint(&mut self, breakpoint: Breakpoint) -> bool {
        self.breakpoints.insert(breakpoint)
    }

    /// Remove a breakpoint. Returns `false` if it was not set.
    pub fn remove_breakpoint(&mut self, breakpoint: &Breakpoint) -> bool {
        self.breakpoints.remove(breakpoint)
    }

    /// Breakpoints currently set, in order
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    /// Remove all breakpoints
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Move forward to the next step hitting any breakpoint.
    pub fn continue_to_breakpoint(&mut self) -> BreakpointSearch {
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let result = self.search(Direction::Forward, "continue_to_breakpoint", |loc| {
            breakpoints.iter().any(|bp| bp.matches(loc))
        });
        self.breakpoints = breakpoints;
        result
    }

    /// Move backward to the previous step hitting any breakpoint.
    pub fn reverse_to_breakpoint(&mut self) -> BreakpointSearch {
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let result = self.search(Direction::Backward, "reverse_to_breakpoint", |loc| {
            breakpoints.iter().any(|bp| bp.matches(loc))
        });
        self.breakpoints = breakpoints;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{counter_artifact, COUNTER};
    use alloy_primitives::Bytes;
    use qdb_common::ensure_test_logging;
    use std::path::PathBuf;

    fn session_from(steps: Vec<TraceStep>) -> DebugSession {
        let registry = Arc::new(ContractRegistry::new());
        registry.register(COUNTER, &counter_artifact()).unwrap();
        DebugSession::new(
            TxHash::ZERO,
            Arc::new(Trace::from(steps)),
            RootFrame::call(COUNTER, Bytes::new()),
            registry,
        )
        .unwrap()
    }

    /// Five steps: CALL at step 1, callee returns at step 4.
    fn call_session() -> DebugSession {
        session_from(vec![
            TraceStep::new(0, 0, "PUSH1"),
            TraceStep::new(1, 1, "CALL"),
            TraceStep::new(2, 2, "PUSH1"),
            TraceStep::new(3, 3, "PUSH1"),
            TraceStep::new(4, 4, "RETURN"),
        ])
    }

    /// Two nested frames: depths `[0, 0, 1, 1, 2, 1, 0, 0]`.
    fn nested_session() -> DebugSession {
        session_from(vec![
            TraceStep::new(0, 0, "PUSH1"),
            TraceStep::new(1, 10, "CALL"),
            TraceStep::new(2, 0, "PUSH1"),
            TraceStep::new(3, 7, "STATICCALL"),
            TraceStep::new(4, 0, "STOP"),
            TraceStep::new(5, 8, "RETURN"),
            TraceStep::new(6, 11, "POP"),
            TraceStep::new(7, 12, "STOP"),
        ])
    }

    /// Runs the counter's code twice in the root frame: pcs 0, 2, 4, 5.
    fn counter_session() -> DebugSession {
        let pcs = [(0, "PUSH1"), (2, "PUSH1"), (4, "ADD"), (0, "PUSH1"), (2, "PUSH1"), (4, "ADD"), (5, "STOP")];
        session_from(
            pcs.iter().enumerate().map(|(i, (pc, op))| TraceStep::new(i as u32, *pc, *op)).collect(),
        )
    }

    #[test]
    fn test_empty_trace_is_unavailable() {
        ensure_test_logging(None);
        let result = DebugSession::new(
            TxHash::ZERO,
            Arc::new(Trace::new()),
            RootFrame::default(),
            Arc::new(ContractRegistry::new()),
        );
        assert!(matches!(result, Err(EngineError::TraceUnavailable { .. })));
    }

    #[test]
    fn test_step_over_skips_call() {
        ensure_test_logging(None);
        let mut session = call_session();
        assert_eq!(session.call_depths(), &[0, 0, 1, 1, 0]);

        session.jump_to_step(1).unwrap();
        assert_eq!(session.step_over(), 4);
    }

    #[test]
    fn test_step_over_never_descends() {
        ensure_test_logging(None);
        for mut session in [call_session(), nested_session()] {
            let last = session.total_steps() - 1;
            for start in 0..session.total_steps() {
                session.jump_to_step(start).unwrap();
                let depth = session.current_depth();
                let landed = session.step_over();
                assert!(
                    session.call_depths()[landed as usize] <= depth || landed == last,
                    "step over from {start} landed on {landed}"
                );
            }
        }
    }

    #[test]
    fn test_step_over_nested_frames() {
        ensure_test_logging(None);
        let mut session = nested_session();
        assert_eq!(session.call_depths(), &[0, 0, 1, 1, 2, 1, 0, 0]);

        session.jump_to_step(1).unwrap();
        assert_eq!(session.step_over(), 6);

        session.jump_to_step(3).unwrap();
        assert_eq!(session.step_over(), 5);
    }

    #[test]
    fn test_step_over_inside_callee_and_at_end() {
        ensure_test_logging(None);
        let mut session = call_session();
        session.jump_to_step(2).unwrap();
        assert_eq!(session.step_over(), 3);

        session.continue_to_end();
        assert_eq!(session.step_over(), 4);
    }

    #[test]
    fn test_step_into_and_back_are_inverse() {
        ensure_test_logging(None);
        let mut session = call_session();
        for start in 1..session.total_steps() - 1 {
            session.jump_to_step(start).unwrap();
            session.step_into();
            assert_eq!(session.step_back(), start);
        }
    }

    #[test]
    fn test_boundaries_are_idempotent() {
        ensure_test_logging(None);
        let mut session = call_session();
        assert_eq!(session.step_back(), 0);
        assert_eq!(session.step_back(), 0);

        assert_eq!(session.continue_to_end(), 4);
        assert_eq!(session.step_into(), 4);
        assert_eq!(session.reset(), 0);
    }

    #[test]
    fn test_step_out() {
        ensure_test_logging(None);
        let mut session = call_session();
        session.jump_to_step(2).unwrap();
        assert_eq!(session.step_out(), 4);

        // root frame: nothing to return to
        session.jump_to_step(1).unwrap();
        assert_eq!(session.step_out(), 4);
    }

    #[test]
    fn test_jump_to_step_out_of_range() {
        ensure_test_logging(None);
        let mut session = call_session();
        session.jump_to_step(3).unwrap();

        let err = session.jump_to_step(5).unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange { index: 5, total: 5 }));
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn test_jump_to_breakpoint_not_found() {
        ensure_test_logging(None);
        let mut session = counter_session();
        session.jump_to_step(1).unwrap();

        let result = session.jump_to_breakpoint(10, Path::new("A.sol"));
        assert_eq!(result, BreakpointSearch { found: false, step: 1 });
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn test_jump_to_breakpoint_scans_forward() {
        ensure_test_logging(None);
        let mut session = counter_session();
        let file = Path::new("Counter.sol");

        // line 4 covers pcs 2 and 4
        assert_eq!(session.jump_to_breakpoint(4, file), BreakpointSearch { found: true, step: 1 });
        assert_eq!(session.jump_to_breakpoint(4, file), BreakpointSearch { found: true, step: 2 });
        assert_eq!(session.jump_to_breakpoint(4, file), BreakpointSearch { found: true, step: 4 });
        assert_eq!(session.jump_to_breakpoint(1, file), BreakpointSearch { found: false, step: 4 });

        assert_eq!(
            session.jump_to_previous_breakpoint(1, file),
            BreakpointSearch { found: true, step: 3 }
        );
    }

    #[test]
    fn test_breakpoint_set() {
        ensure_test_logging(None);
        let mut session = counter_session();
        let header = Breakpoint::new("Counter.sol", 1);

        assert!(session.add_breakpoint(header.clone()));
        assert!(!session.add_breakpoint(header.clone()));
        assert_eq!(session.breakpoints().count(), 1);

        assert_eq!(session.continue_to_breakpoint(), BreakpointSearch { found: true, step: 3 });
        assert_eq!(session.continue_to_breakpoint(), BreakpointSearch { found: false, step: 3 });
        assert_eq!(session.reverse_to_breakpoint(), BreakpointSearch { found: true, step: 0 });
        assert_eq!(session.breakpoints().count(), 1);

        assert!(session.remove_breakpoint(&header));
        assert!(!session.remove_breakpoint(&header));
        session.add_breakpoint(Breakpoint::new(PathBuf::from("Counter.sol"), 4));
        session.clear_breakpoints();
        assert_eq!(session.breakpoints().count(), 0);
    }

    #[test]
    fn test_current_source() {
        ensure_test_logging(None);
        let mut session = counter_session();
        session.jump_to_step(2).unwrap();

        let loc = session.current_source_location().unwrap();
        assert_eq!(loc.line, 4);
        assert_eq!(session.source_text().as_deref(), Some("x += 1"));

        // compiler-generated STOP
        session.continue_to_end();
        assert_eq!(session.current_source_location(), None);
        assert_eq!(session.source_text(), None);
    }
}
